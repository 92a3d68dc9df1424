//! Per-connection message routing
//!
//! One router loop runs for every connection handle:
//!
//! ```text
//!   ChatConnection::messages()
//!            │
//!            ▼
//!      router::run ──► control channel? ──► dispatch (own task)
//!            │
//!            ├──► sink queue      (try_send, drop when full)
//!            └──► ListenerSet     (try_send per listener, drop when full)
//! ```
//!
//! Neither the sink nor any listener can stall the loop. Messages of one
//! connection reach every consumer in the order the connection produced them.

pub mod listener;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::{Message, SharedMessage};
use crate::stats::RouterStats;

pub use listener::{Delivery, Listener, ListenerId, ListenerSet};

/// Routing state for one shard
#[derive(Clone)]
pub struct Router {
    shard: u32,
    control_channel: Arc<str>,
    sink: mpsc::Sender<SharedMessage>,
    listeners: Arc<ListenerSet>,
    stats: Arc<RouterStats>,
}

impl Router {
    /// Create a router feeding `sink` and `listeners`
    ///
    /// An empty `control_channel` disables command detection.
    pub fn new(
        shard: u32,
        control_channel: Arc<str>,
        sink: mpsc::Sender<SharedMessage>,
        listeners: Arc<ListenerSet>,
    ) -> Self {
        Self {
            shard,
            control_channel,
            sink,
            listeners,
            stats: Arc::new(RouterStats::new()),
        }
    }

    pub fn shard(&self) -> u32 {
        self.shard
    }

    pub fn stats(&self) -> &Arc<RouterStats> {
        &self.stats
    }

    /// Whether the message was posted on the control channel
    pub fn is_command(&self, msg: &Message) -> bool {
        !self.control_channel.is_empty() && msg.channel.as_str() == &*self.control_channel
    }

    /// Route one message
    ///
    /// Control-channel messages are handed to `dispatch` first; `dispatch`
    /// must not block.
    pub fn route<D>(&self, msg: SharedMessage, dispatch: &D)
    where
        D: Fn(SharedMessage),
    {
        self.stats.record_routed();

        if self.is_command(&msg) {
            self.stats.record_command();
            dispatch(SharedMessage::clone(&msg));
        }

        match self.sink.try_send(SharedMessage::clone(&msg)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.record_sink_drop();
                tracing::trace!(shard = self.shard, channel = %msg.channel, "Sink full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_sink_drop();
                tracing::trace!(shard = self.shard, "Sink closed, message dropped");
            }
        }

        let delivery = self.listeners.deliver(&msg);
        self.stats.record_listeners(delivery.delivered, delivery.dropped);
    }
}

/// Run the routing loop until the inbound stream closes
///
/// Downstream queues are not closed here; the sink queue closes when the
/// last router clone is dropped and listeners are closed by the logger.
pub async fn run<D>(router: Router, mut inbound: mpsc::Receiver<Message>, dispatch: D)
where
    D: Fn(SharedMessage) + Send + 'static,
{
    tracing::debug!(shard = router.shard, "Router started");

    while let Some(msg) = inbound.recv().await {
        router.route(Arc::new(msg), &dispatch);
    }

    let stats = router.stats.snapshot();
    tracing::info!(
        shard = router.shard,
        routed = stats.routed,
        sink_dropped = stats.sink_dropped,
        listener_dropped = stats.listener_dropped,
        "Inbound stream closed, router stopped"
    );
}
