//! Logging sinks
//!
//! A sink receives one bounded queue per shard. The router never waits on
//! it: when the queue is full the message is dropped for the sink.

pub mod file;

use tokio::sync::mpsc;

use crate::protocol::SharedMessage;

pub use file::FileSink;

/// Durable storage for chat messages
pub trait LogSink: Send + Sync + 'static {
    /// Start consuming a shard's queue
    ///
    /// Called once per connection handle. Implementations spawn their own
    /// task and must return promptly.
    fn start(&self, shard_id: u32, messages: mpsc::Receiver<SharedMessage>);
}
