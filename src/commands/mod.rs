pub mod dispatcher;
pub mod parse;

pub use dispatcher::{Command, Dispatcher, Reply, ReplyKind, Sender};
pub use parse::{Input, parse_input};
