pub mod api;
pub mod poller;

pub use api::{TelegramClient, TelegramError, Update};
pub use poller::{Incoming, Poller};
