//! Twitch IRC client configuration

use std::time::Duration;

use serde::Deserialize;

use crate::config::duration_secs;

/// Connection settings shared by every shard
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitchConfig {
    /// IRC server address (`host:port`)
    pub addr: String,

    /// Login nick
    pub nick: String,

    /// OAuth token sent as `PASS` (empty = anonymous login)
    pub oauth: String,

    /// Delay between reconnect attempts
    #[serde(rename = "reconnect_delay_secs", with = "duration_secs")]
    pub reconnect_delay: Duration,

    /// Capacity of the inbound and outbound queues of each connection
    pub message_buffer: usize,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            addr: "irc.chat.twitch.tv:6667".to_string(),
            nick: "justinfan12345".to_string(),
            oauth: String::new(),
            reconnect_delay: Duration::from_secs(5),
            message_buffer: 256,
        }
    }
}

impl TwitchConfig {
    /// Set the server address
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    /// Set the login nick
    pub fn nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = nick.into();
        self
    }

    /// Set the OAuth token
    pub fn oauth(mut self, oauth: impl Into<String>) -> Self {
        self.oauth = oauth.into();
        self
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the queue capacity
    pub fn message_buffer(mut self, size: usize) -> Self {
        self.message_buffer = size.max(1);
        self
    }
}
