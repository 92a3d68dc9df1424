//! Channel-existence checks
//!
//! Operator-initiated joins ask a [`ChannelDirectory`] whether the channel
//! exists upstream before joining it. [`HttpChannelDirectory`] does this with
//! one `GET <endpoint><channel>` carrying a `Client-ID` header.
//!
//! Any non-2xx answer, transport error or timeout counts as "does not exist".
//! During an upstream outage joins are therefore rejected as invalid; the
//! cause is logged at `warn` so an outage stays distinguishable in logs.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::duration_secs;
use crate::error::{Error, Result};

/// Answers whether a channel exists upstream
#[async_trait]
pub trait ChannelDirectory: Send + Sync + 'static {
    async fn exists(&self, channel: &str) -> bool;
}

/// Configuration for [`HttpChannelDirectory`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Base URL; the channel name is appended as the last path segment
    pub endpoint: String,

    /// Value of the `Client-ID` header
    pub client_id: String,

    /// Request timeout
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.twitch.tv/kraken/users/".to_string(),
            client_id: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl DirectoryConfig {
    /// Set the endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the client id header value
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Channel directory backed by an HTTP metadata endpoint
pub struct HttpChannelDirectory {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    client_id: String,
}

impl HttpChannelDirectory {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let endpoint = reqwest::Url::parse(&config.endpoint)
            .map_err(|e| Error::Config(format!("invalid directory endpoint: {}", e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "directory endpoint cannot be a base URL: {}",
                config.endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            client_id: config.client_id.clone(),
        })
    }

    /// URL queried for a channel
    pub fn url_for(&self, channel: &str) -> reqwest::Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(channel);
        }
        url
    }
}

#[async_trait]
impl ChannelDirectory for HttpChannelDirectory {
    async fn exists(&self, channel: &str) -> bool {
        let url = self.url_for(channel);
        let response = self
            .client
            .get(url)
            .header("Client-ID", &self.client_id)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => true,
            Ok(res) => {
                tracing::debug!(channel = channel, status = %res.status(), "Channel lookup rejected");
                false
            }
            Err(e) => {
                tracing::warn!(channel = channel, error = %e, "Channel lookup failed, treating as nonexistent");
                false
            }
        }
    }
}
