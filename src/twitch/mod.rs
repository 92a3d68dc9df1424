//! Twitch chat over IRC
//!
//! Implements [`ChatConnection`](crate::protocol::ChatConnection) and
//! [`ConnectionFactory`](crate::protocol::ConnectionFactory) on top of a
//! plain TCP IRC session:
//!
//! ```text
//!   TcpStream ──► LineCodec ──► IrcLine::parse ──► PRIVMSG / NOTICE / ... ──► Message
//!                                     │
//!                                     └── PING ──► PONG
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod irc;

pub use codec::LineCodec;
pub use config::TwitchConfig;
pub use connection::{TwitchConnection, TwitchFactory};
pub use irc::IrcLine;
