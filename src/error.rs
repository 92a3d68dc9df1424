//! Error types
//!
//! Errors surfaced by the join/leave protocol, the roster and the bootstrap
//! path. Collaborator failures keep their own [`ConnectionError`] type and are
//! wrapped by [`Error::Connection`].

use crate::protocol::ConnectionError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for chat logger operations
#[derive(Debug)]
pub enum Error {
    /// Channel is already in the roster
    AlreadyMonitored(String),
    /// Channel-existence check reported the channel does not exist
    ChannelInvalid(String),
    /// Channel is not in the roster
    NotMonitored(String),
    /// Every join attempt for the channel failed
    JoinFailed(String),
    /// A connection handle could not be created for the given shard
    HandleCreationFailed { shard: u32, reason: String },
    /// Roster could not be written to its backing file
    PersistenceFailed(String),
    /// No connection handle exists for the given shard id
    UnknownShard(u32),
    /// Underlying connection failure
    Connection(ConnectionError),
    /// Configuration is invalid or could not be read
    Config(String),
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AlreadyMonitored(channel) => write!(f, "Already monitoring channel: {}", channel),
            Error::ChannelInvalid(channel) => write!(f, "Channel does not exist: {}", channel),
            Error::NotMonitored(channel) => write!(f, "Channel not monitored: {}", channel),
            Error::JoinFailed(channel) => write!(f, "Failed to join channel: {}", channel),
            Error::HandleCreationFailed { shard, reason } => {
                write!(f, "Failed to create connection for shard {}: {}", shard, reason)
            }
            Error::PersistenceFailed(reason) => write!(f, "Failed to persist roster: {}", reason),
            Error::UnknownShard(shard) => write!(f, "No connection for shard {}", shard),
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Config(reason) => write!(f, "Invalid configuration: {}", reason),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
