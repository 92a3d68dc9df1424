//! Logger configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::duration_secs;
use crate::error::{Error, Result};

/// Default maximum channels joined on one connection
pub const DEFAULT_MAX_CHANNELS_PER_CONNECTION: usize = 50;

/// Default capacity of each shard's sink queue
pub const DEFAULT_MESSAGE_BUFFER_SIZE: usize = 100;

/// Core logger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Nicks allowed to issue commands
    pub admins: Vec<String>,

    /// Channel on which commands are recognized (empty = disabled)
    pub command_channel: String,

    /// Path of the persisted roster
    pub channel_list_path: PathBuf,

    /// Maximum channels joined on one connection
    pub max_channels_per_connection: usize,

    /// Capacity of each shard's sink queue
    pub message_buffer_size: usize,

    /// Capacity of each listener subscription
    pub listener_buffer_size: usize,

    /// Delay after opening a connection before channels are joined on it
    #[serde(rename = "warmup_secs", with = "duration_secs")]
    pub warmup: Duration,

    /// Extra join attempts after the first failure
    pub max_join_retries: u32,

    /// Enable protocol-level debug logging on connections
    pub debug: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            command_channel: String::new(),
            channel_list_path: PathBuf::from("channels.json"),
            max_channels_per_connection: DEFAULT_MAX_CHANNELS_PER_CONNECTION,
            message_buffer_size: DEFAULT_MESSAGE_BUFFER_SIZE,
            listener_buffer_size: 1,
            warmup: Duration::from_secs(5),
            max_join_retries: 1,
            debug: false,
        }
    }
}

impl LoggerConfig {
    /// Set the admin nicks
    pub fn admins<I, S>(mut self, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admins = admins.into_iter().map(Into::into).collect();
        self
    }

    /// Set the control channel
    pub fn command_channel(mut self, channel: impl Into<String>) -> Self {
        self.command_channel = channel.into();
        self
    }

    /// Set the roster path
    pub fn channel_list_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.channel_list_path = path.into();
        self
    }

    /// Set the per-connection channel capacity
    pub fn max_channels_per_connection(mut self, max: usize) -> Self {
        self.max_channels_per_connection = max;
        self
    }

    /// Set the sink queue capacity
    pub fn message_buffer_size(mut self, size: usize) -> Self {
        self.message_buffer_size = size;
        self
    }

    /// Set the listener queue capacity
    pub fn listener_buffer_size(mut self, size: usize) -> Self {
        self.listener_buffer_size = size;
        self
    }

    /// Set the connection warm-up delay
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Set the number of join retries
    pub fn max_join_retries(mut self, retries: u32) -> Self {
        self.max_join_retries = retries;
        self
    }

    /// Enable connection debug logging
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Check values the logger cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_channels_per_connection == 0 {
            return Err(Error::Config(
                "max_channels_per_connection must be at least 1".into(),
            ));
        }
        if self.message_buffer_size == 0 {
            return Err(Error::Config("message_buffer_size must be at least 1".into()));
        }
        if self.listener_buffer_size == 0 {
            return Err(Error::Config("listener_buffer_size must be at least 1".into()));
        }
        Ok(())
    }
}
