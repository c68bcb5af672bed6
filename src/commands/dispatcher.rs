use std::fmt::Write;
use std::sync::Arc;

use super::parse::{Input, parse_input};
use crate::storage::BirthdayStore;

const COMMANDS_OVERVIEW: &str = "Commands:\n\
    /add <name> <YYYY-MM-DD> – Add a birthday\n\
    /list – Show all birthdays\n\
    /delete <name> – Delete a birthday\n\
    /help – Show this message again";

const HELP_TEXT: &str = "Here's how you can use me:\n\
    /add <name> <YYYY-MM-DD>\n\
    /list\n\
    /delete <name>";

const ADD_USAGE: &str = "Please enter <name> <YYYY-MM-DD>\nUsage: /add <name> <YYYY-MM-DD>";
const DELETE_USAGE: &str = "Usage: /delete <name>";
const STORAGE_FAILURE: &str = "Sorry, I couldn't save that change. Please try again later.";

/// Commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Add,
    List,
    Delete,
}

impl Command {
    /// Look up a command by its name (without '/')
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "add" => Some(Command::Add),
            "list" => Some(Command::List),
            "delete" => Some(Command::Delete),
            _ => None,
        }
    }
}

/// Category of a reply, so callers can tell outcomes apart without parsing text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Static welcome/help text, or a listing
    Info,
    /// A mutation went through
    Success,
    /// Arguments didn't match the command's contract; nothing changed
    UsageError,
    /// Delete of a name that isn't stored
    NotFound,
    /// The change could not be persisted
    StorageFailure,
    /// Free text sent back unchanged
    Echo,
}

/// User-facing result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
}

impl Reply {
    fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Reply {
            kind,
            text: text.into(),
        }
    }
}

/// Who sent the message
#[derive(Debug, Clone, Default)]
pub struct Sender {
    pub first_name: Option<String>,
}

impl Sender {
    pub fn named(first_name: impl Into<String>) -> Self {
        Sender {
            first_name: Some(first_name.into()),
        }
    }
}

/// Routes one command to the store and formats the outcome
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<BirthdayStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<BirthdayStore>) -> Self {
        Dispatcher { store }
    }

    pub fn store(&self) -> &BirthdayStore {
        &self.store
    }

    /// Tokenize a raw chat line and dispatch it
    /// Returns None when the line calls for no reply.
    pub fn handle_text(
        &self,
        text: &str,
        sender: &Sender,
        bot_username: Option<&str>,
    ) -> Option<Reply> {
        match parse_input(text, bot_username) {
            Input::Command { name, args } => self.dispatch(&name, &args, sender),
            Input::Text(text) => Some(Reply::new(ReplyKind::Echo, text)),
            Input::Ignored => None,
        }
    }

    /// Run one command; unknown commands get no reply
    pub fn dispatch(&self, name: &str, args: &[String], sender: &Sender) -> Option<Reply> {
        let Some(command) = Command::from_name(name) else {
            log::debug!("Ignoring unknown command /{}", name);
            return None;
        };

        log::debug!("Dispatching /{} with {} args", name, args.len());

        let reply = match command {
            Command::Start => self.start(sender),
            Command::Help => Reply::new(ReplyKind::Info, HELP_TEXT),
            Command::Add => self.add(args),
            Command::List => self.list(),
            Command::Delete => self.delete(args),
        };

        Some(reply)
    }

    fn start(&self, sender: &Sender) -> Reply {
        let greeting = match sender.first_name.as_deref() {
            Some(name) if !name.is_empty() => format!("Hi {}!", name),
            _ => "Hi there!".to_string(),
        };

        Reply::new(
            ReplyKind::Info,
            format!("{}\n\nWelcome to BirthdayBot!\n{}", greeting, COMMANDS_OVERVIEW),
        )
    }

    fn add(&self, args: &[String]) -> Reply {
        let [name, date] = args else {
            return Reply::new(ReplyKind::UsageError, ADD_USAGE);
        };

        match self.store.put(name, date) {
            Ok(_) => {
                log::info!("Added birthday for {:?}", name);
                Reply::new(
                    ReplyKind::Success,
                    format!("Added {}'s birthday on {}", name, date),
                )
            }
            Err(_) => Reply::new(ReplyKind::StorageFailure, STORAGE_FAILURE),
        }
    }

    fn list(&self) -> Reply {
        let registry = self.store.load();

        if registry.is_empty() {
            return Reply::new(ReplyKind::Info, "No birthdays to show");
        }

        let mut message = String::from("Saved birthdays:");
        for record in registry.records() {
            let _ = write!(message, "\n{}", record);
        }

        Reply::new(ReplyKind::Info, message)
    }

    fn delete(&self, args: &[String]) -> Reply {
        // Extra arguments are ignored; the first token is the name
        let Some(name) = args.first() else {
            return Reply::new(ReplyKind::UsageError, DELETE_USAGE);
        };

        match self.store.delete(name) {
            Ok((_, true)) => {
                log::info!("Deleted birthday for {:?}", name);
                Reply::new(ReplyKind::Success, format!("Deleted {}'s birthday!", name))
            }
            Ok((_, false)) => Reply::new(ReplyKind::NotFound, "No such name was found!"),
            Err(_) => Reply::new(ReplyKind::StorageFailure, STORAGE_FAILURE),
        }
    }
}
