//! Join/leave protocol and startup replay

use std::sync::Arc;

use super::ChatLogger;
use crate::error::{Error, Result};
use crate::protocol::{ChatConnection, ConnectionError, ConnectionFactory};

/// Outcome of replaying the roster at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Channels joined
    pub joined: usize,
    /// Channels that could not be joined
    pub failed: Vec<String>,
}

impl<F: ConnectionFactory> ChatLogger<F> {
    /// Join every roster channel in sorted order
    ///
    /// Existence checks and roster writes are skipped since these channels
    /// are already recorded. Failures are logged and the replay continues.
    pub async fn start(self: &Arc<Self>) -> ReplayReport {
        let channels = self.roster.snapshot().await;
        tracing::info!(channels = channels.len(), "Replaying roster");

        let mut report = ReplayReport::default();
        for channel in channels {
            match self.join(&channel, false).await {
                Ok(()) => report.joined += 1,
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Failed to join channel during replay");
                    report.failed.push(channel);
                }
            }
        }

        tracing::info!(
            joined = report.joined,
            failed = report.failed.len(),
            shards = self.pool.len().await,
            "Roster replay finished"
        );
        report
    }

    /// Join a channel
    ///
    /// With `validate`, the join is operator-initiated: it is refused for a
    /// channel already in the roster, already being joined, or unknown
    /// upstream, and a successful join is recorded in the roster. A failed
    /// roster write is logged and does not undo the join.
    pub async fn join(self: &Arc<Self>, channel: &str, validate: bool) -> Result<()> {
        if !validate {
            return self.join_on_shard(channel).await;
        }

        let Some(claim) = self.roster.claim(channel).await else {
            return Err(Error::AlreadyMonitored(channel.to_string()));
        };
        if !self.directory.exists(channel).await {
            return Err(Error::ChannelInvalid(channel.to_string()));
        }
        self.join_on_shard(channel).await?;

        match self.roster.insert(claim.name()).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(channel = channel, "Channel already in roster"),
            Err(e) => tracing::error!(channel = channel, error = %e, "Failed to save roster"),
        }
        Ok(())
    }

    /// Reserve a slot and join the channel on its shard
    async fn join_on_shard(self: &Arc<Self>, channel: &str) -> Result<()> {
        let slot = self.acquire_handle_for(channel).await?;
        let shard = slot.handle().id();
        let retries = self.config.max_join_retries;
        let joined = join_with_retry(slot.handle().connection().as_ref(), channel, retries).await;
        drop(slot);

        if let Err(e) = joined {
            tracing::warn!(channel = channel, shard = shard, error = %e, "Giving up on channel");
            return Err(Error::JoinFailed(channel.to_string()));
        }
        tracing::info!(channel = channel, shard = shard, "Joined channel");
        Ok(())
    }

    /// Leave a channel
    ///
    /// Shards are tried in id order until one accepts the leave. The roster
    /// is only updated if one did.
    pub async fn leave(&self, channel: &str) -> Result<()> {
        if !self.roster.contains(channel).await {
            return Err(Error::NotMonitored(channel.to_string()));
        }

        let mut last_error = ConnectionError::NotJoined(channel.to_string());
        let mut left_on = None;
        for handle in self.pool.handles().await {
            match handle.connection().leave(channel).await {
                Ok(()) => {
                    left_on = Some(handle.id());
                    break;
                }
                Err(e) => last_error = e,
            }
        }

        let Some(shard) = left_on else {
            tracing::warn!(channel = channel, error = %last_error, "No shard accepted leave");
            return Err(Error::Connection(last_error));
        };
        tracing::info!(channel = channel, shard = shard, "Left channel");

        if let Err(e) = self.roster.remove(channel).await {
            tracing::error!(channel = channel, error = %e, "Failed to save roster");
        }
        Ok(())
    }
}

/// Join with up to `retries` extra attempts, returning the last error
async fn join_with_retry<C: ChatConnection>(
    connection: &C,
    channel: &str,
    retries: u32,
) -> std::result::Result<(), ConnectionError> {
    let mut last_error = ConnectionError::NotConnected;
    for attempt in 0..=retries {
        match connection.join(channel).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(channel = channel, attempt = attempt + 1, error = %e, "Join attempt failed");
                last_error = e;
            }
        }
    }
    Err(last_error)
}
