//! Admin command grammar
//!
//! Commands are recognized only on the control channel. The text is
//! lowercased and split on single spaces; the first token is the verb and the
//! second its argument:
//!
//! ```text
//!   !join <channel>    start logging a channel
//!   !leave <channel>   stop logging a channel
//! ```
//!
//! Anything else, including a verb without its argument, is ignored.

use std::collections::HashSet;

use crate::error::Error;
use crate::protocol::Message;

/// A parsed admin command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `!join <channel>`
    Join(String),
    /// `!leave <channel>`
    Leave(String),
}

impl Command {
    /// Parse command text, returning `None` for unknown or malformed input
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.to_lowercase();
        let mut tokens = lowered.split(' ');
        let verb = tokens.next()?;
        let arg = tokens.next().filter(|a| !a.is_empty())?;

        match verb {
            "!join" => Some(Command::Join(arg.to_string())),
            "!leave" => Some(Command::Leave(arg.to_string())),
            _ => None,
        }
    }

    /// Channel the command targets
    pub fn channel(&self) -> &str {
        match self {
            Command::Join(channel) | Command::Leave(channel) => channel,
        }
    }
}

/// Chat reply for the outcome of `!join`; `None` means stay silent
pub fn join_reply(channel: &str, result: &Result<(), Error>) -> Option<String> {
    match result {
        Ok(()) => Some(format!("Logging {}", channel)),
        Err(Error::ChannelInvalid(_)) => Some("Channel doesn't exist!".to_string()),
        Err(Error::AlreadyMonitored(_)) => Some(format!("Already logging {}", channel)),
        Err(_) => None,
    }
}

/// Chat reply for the outcome of `!leave`
pub fn leave_reply(channel: &str, result: &Result<(), Error>) -> String {
    match result {
        Ok(()) => format!("Leaving {}", channel),
        Err(_) => format!("Not logging {}", channel),
    }
}

/// Identities allowed to issue commands
///
/// Loaded once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct AdminSet {
    nicks: HashSet<String>,
}

impl AdminSet {
    pub fn new<I, S>(nicks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nicks: nicks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.nicks.contains(nick)
    }

    pub fn len(&self) -> usize {
        self.nicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nicks.is_empty()
    }

    /// Whether the message may issue a command
    ///
    /// Privileged system messages bypass the admin check.
    pub fn authorizes(&self, msg: &Message) -> bool {
        msg.is_privileged() || self.contains(&msg.nick)
    }
}
