//! Inbound chat message types
//!
//! Messages are produced by a [`ChatConnection`](super::ChatConnection) and
//! shared between the logging sink and every listener, so the router wraps
//! each one in an `Arc` once and hands out cheap clones.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Message shared between the sink and listeners
pub type SharedMessage = Arc<Message>;

/// Type tag of an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Ordinary chat text (PRIVMSG)
    Chat,
    /// Protocol control line (NOTICE, USERNOTICE, CLEARCHAT, ...)
    Notice,
    /// Operator-injected message; bypasses the admin check for commands
    System,
}

impl MessageKind {
    /// Short tag used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Chat => "MSG",
            MessageKind::Notice => "NOTICE",
            MessageKind::System => "SYSTEM",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message received on a chat connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type
    pub kind: MessageKind,
    /// Sender nick
    pub nick: String,
    /// Channel the message was posted to, without the leading `#`
    pub channel: String,
    /// Payload text
    pub text: String,
    /// When the message was received
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Create a message of the given kind, stamped with the current time
    pub fn new(
        kind: MessageKind,
        channel: impl Into<String>,
        nick: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            nick: nick.into(),
            channel: channel.into(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    /// Create an ordinary chat message
    pub fn chat(channel: impl Into<String>, nick: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Chat, channel, nick, text)
    }

    /// Create a protocol notice
    pub fn notice(channel: impl Into<String>, nick: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Notice, channel, nick, text)
    }

    /// Create an operator-injected system message
    pub fn system(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::System, channel, "", text)
    }

    /// Whether this message bypasses the admin check
    pub fn is_privileged(&self) -> bool {
        self.kind == MessageKind::System
    }
}
