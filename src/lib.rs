//! Sharded chat-log ingestion for Twitch
//!
//! Keeps a durable roster of monitored channels, spreads them over as few
//! chat connections as possible, and fans every inbound message out to a
//! logging sink and to any number of live listeners. Admins add and remove
//! channels by posting `!join <channel>` / `!leave <channel>` in a control
//! channel.
//!
//! # Architecture
//!
//! ```text
//!   channels.json ──► ChannelRoster ──► ChatLogger::start (replay)
//!                                             │
//!                                             ▼
//!                      ShardPool ── shard 1 ── TwitchConnection ──► Router ──► LogSink
//!                                ── shard 2 ── TwitchConnection ──► Router ──► Listeners
//!                                ── ...                              │
//!                                                                    └──► !join / !leave
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chatlog_rs::{
//!     ChannelRoster, ChatLogger, DirectoryConfig, FileSink, HttpChannelDirectory, LoggerConfig,
//!     TwitchConfig, TwitchFactory,
//! };
//!
//! # async fn example() -> chatlog_rs::Result<()> {
//! let config = LoggerConfig::default()
//!     .admins(["alice"])
//!     .command_channel("chatlogbot");
//! let roster = ChannelRoster::load(&config.channel_list_path).await?;
//! let directory = HttpChannelDirectory::new(&DirectoryConfig::default())?;
//!
//! let logger = ChatLogger::new(
//!     config,
//!     roster,
//!     TwitchFactory::new(TwitchConfig::default()),
//!     directory,
//!     FileSink::new("logs"),
//! )?;
//! logger.start().await;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod directory;
pub mod error;
pub mod logger;
pub mod protocol;
pub mod roster;
pub mod router;
pub mod shard;
pub mod sink;
pub mod stats;
pub mod twitch;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use directory::{ChannelDirectory, DirectoryConfig, HttpChannelDirectory};
pub use error::{Error, Result};
pub use logger::{ChatLogger, LoggerConfig, ReplayReport};
pub use protocol::{ChatConnection, ConnectionError, ConnectionFactory, Message, MessageKind};
pub use roster::{ChannelList, ChannelRoster};
pub use router::{Listener, ListenerId};
pub use sink::{FileSink, LogSink};
pub use twitch::{TwitchConfig, TwitchFactory};
