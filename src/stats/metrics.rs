//! Statistics for message routing

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live per-shard routing counters
///
/// Updated by the router without locking.
#[derive(Debug)]
pub struct RouterStats {
    started_at: Instant,
    routed: AtomicU64,
    sink_dropped: AtomicU64,
    listener_delivered: AtomicU64,
    listener_dropped: AtomicU64,
    commands: AtomicU64,
}

impl RouterStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            routed: AtomicU64::new(0),
            sink_dropped: AtomicU64::new(0),
            listener_delivered: AtomicU64::new(0),
            listener_dropped: AtomicU64::new(0),
            commands: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_routed(&self) {
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sink_drop(&self) {
        self.sink_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_listeners(&self, delivered: u64, dropped: u64) {
        if delivered > 0 {
            self.listener_delivered.fetch_add(delivered, Ordering::Relaxed);
        }
        if dropped > 0 {
            self.listener_dropped.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ShardStats {
        ShardStats {
            routed: self.routed.load(Ordering::Relaxed),
            sink_dropped: self.sink_dropped.load(Ordering::Relaxed),
            listener_delivered: self.listener_delivered.load(Ordering::Relaxed),
            listener_dropped: self.listener_dropped.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RouterStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a shard's routing counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Messages pulled from the connection
    pub routed: u64,
    /// Messages dropped because the sink queue was full
    pub sink_dropped: u64,
    /// Listener deliveries that succeeded
    pub listener_delivered: u64,
    /// Listener deliveries skipped because the listener was full
    pub listener_dropped: u64,
    /// Control-channel messages dispatched to the command processor
    pub commands: u64,
    /// Time since the shard started
    pub uptime: Duration,
}

impl ShardStats {
    /// Fraction of routed messages the sink missed
    pub fn sink_drop_ratio(&self) -> f64 {
        if self.routed > 0 {
            self.sink_dropped as f64 / self.routed as f64
        } else {
            0.0
        }
    }
}
