//! Chat connection collaborator interface
//!
//! The core never talks to the wire directly. It drives connections through
//! [`ChatConnection`] and creates them through [`ConnectionFactory`]; the
//! [`twitch`](crate::twitch) module provides the IRC implementation.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::message::Message;

/// Error reported by a chat connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Connection is not running or was stopped
    NotConnected,
    /// Channel is not joined on this connection
    NotJoined(String),
    /// Server rejected the request
    Rejected(String),
    /// Transport failure
    Transport(String),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::NotConnected => write!(f, "Not connected"),
            ConnectionError::NotJoined(channel) => write!(f, "Not joined to {}", channel),
            ConnectionError::Rejected(reason) => write!(f, "Rejected: {}", reason),
            ConnectionError::Transport(reason) => write!(f, "Transport error: {}", reason),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// One protocol connection able to host a bounded number of channels
#[async_trait]
pub trait ChatConnection: Send + Sync + 'static {
    /// Join a channel
    async fn join(&self, channel: &str) -> Result<(), ConnectionError>;

    /// Leave a channel
    async fn leave(&self, channel: &str) -> Result<(), ConnectionError>;

    /// Send a chat message; best-effort, no delivery confirmation
    async fn send(&self, channel: &str, text: &str);

    /// Channels currently joined on this connection
    async fn channels(&self) -> Vec<String>;

    /// Take the inbound message stream
    ///
    /// Returns `Some` exactly once. The stream closes when the connection
    /// terminates.
    fn messages(&self) -> Option<mpsc::Receiver<Message>>;

    /// Run the connection's receive/send activity until [`stop`](Self::stop)
    ///
    /// Must be invoked exactly once per connection, on its own task.
    async fn run(&self);

    /// Terminate the connection and its background activity
    fn stop(&self);

    /// Toggle protocol-level debug logging
    fn set_debug(&self, debug: bool);
}

/// Creates connections for new shards
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Connection type produced by this factory
    type Connection: ChatConnection;

    /// Instantiate a connection for the given shard id
    ///
    /// The connection is not started; the caller invokes `run` on it.
    fn create(&self, shard_id: u32) -> Result<Self::Connection, ConnectionError>;
}
