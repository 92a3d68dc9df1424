//! Chat protocol collaborator types
//!
//! This module defines what the core consumes from a chat protocol client:
//! - [`Message`]: the immutable inbound message value
//! - [`ChatConnection`]: join/leave/send plus the inbound stream
//! - [`ConnectionFactory`]: creates one connection per shard

pub mod connection;
pub mod message;

pub use connection::{ChatConnection, ConnectionError, ConnectionFactory};
pub use message::{Message, MessageKind, SharedMessage};
