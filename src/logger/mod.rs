//! Chat logger
//!
//! [`ChatLogger`] is the context object tying the pieces together. It is
//! built once at startup, shared through an `Arc`, and owns:
//!
//! ```text
//!                         Arc<ChatLogger<F>>
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ roster:    ChannelRoster   (Mutex, channels.json)        │
//!   │ pool:      ShardPool       (RwLock<BTreeMap<id, handle>>) │
//!   │ listeners: ListenerSet     (Mutex<Vec<Sender>>)           │
//!   │ admins:    AdminSet        (immutable)                   │
//!   │ factory / directory / sink (collaborators)               │
//!   └──────────────────────────────────────────────────────────┘
//!          │ create_handle(id)
//!          ▼
//!   conn.run() task ── messages() ──► router::run task ──► sink, listeners
//!                                            │
//!                                            └──► command task ──► join / leave
//! ```
//!
//! Lock order is pool before roster. No code path holds both.

pub mod config;
mod commands;
mod membership;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::command::AdminSet;
use crate::directory::ChannelDirectory;
use crate::error::{Error, Result};
use crate::protocol::{ChatConnection, ConnectionFactory, Message, SharedMessage};
use crate::roster::ChannelRoster;
use crate::router::{self, Listener, ListenerId, ListenerSet, Router};
use crate::shard::{ConnectionHandle, ShardPool, SlotReservation};
use crate::sink::LogSink;
use crate::stats::ShardStats;

pub use config::LoggerConfig;
pub use membership::ReplayReport;

type Handle<F> = ConnectionHandle<<F as ConnectionFactory>::Connection>;

/// Sharded chat logger
pub struct ChatLogger<F: ConnectionFactory> {
    config: LoggerConfig,
    control_channel: Arc<str>,
    admins: AdminSet,
    roster: ChannelRoster,
    pool: ShardPool<F::Connection>,
    listeners: Arc<ListenerSet>,
    factory: F,
    directory: Arc<dyn ChannelDirectory>,
    sink: Arc<dyn LogSink>,
}

impl<F: ConnectionFactory> ChatLogger<F> {
    /// Build a logger
    ///
    /// Nothing is connected until [`start`](Self::start) or the first join.
    pub fn new(
        config: LoggerConfig,
        roster: ChannelRoster,
        factory: F,
        directory: impl ChannelDirectory,
        sink: impl LogSink,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        Ok(Arc::new(Self {
            control_channel: Arc::from(config.command_channel.as_str()),
            admins: AdminSet::new(config.admins.iter().cloned()),
            pool: ShardPool::new(config.max_channels_per_connection),
            listeners: Arc::new(ListenerSet::new(config.listener_buffer_size)),
            roster,
            factory,
            directory: Arc::new(directory),
            sink: Arc::new(sink),
            config,
        }))
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn roster(&self) -> &ChannelRoster {
        &self.roster
    }

    pub fn pool(&self) -> &ShardPool<F::Connection> {
        &self.pool
    }

    pub fn admins(&self) -> &AdminSet {
        &self.admins
    }

    /// Subscribe to the live message stream of every shard
    pub fn subscribe(&self) -> Listener {
        self.listeners.subscribe()
    }

    /// Drop a listener subscription
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Routing counters per shard, in shard id order
    pub async fn stats(&self) -> Vec<(u32, ShardStats)> {
        self.pool
            .handles()
            .await
            .iter()
            .map(|h| (h.id(), h.stats()))
            .collect()
    }

    /// Route a message as if it arrived on the given shard
    ///
    /// Used to feed operator commands as [`MessageKind::System`](crate::protocol::MessageKind::System)
    /// messages.
    pub async fn inject(self: &Arc<Self>, shard_id: u32, msg: Message) -> Result<()> {
        let handle = self
            .pool
            .get(shard_id)
            .await
            .ok_or(Error::UnknownShard(shard_id))?;
        let dispatch = self.dispatcher(Arc::clone(&handle));
        handle.router().route(Arc::new(msg), &dispatch);
        Ok(())
    }

    /// Stop every shard, then close every listener
    ///
    /// In-flight joins and commands finish on their own.
    pub async fn stop(&self) {
        tracing::info!(shards = self.pool.len().await, "Stopping chat logger");
        self.pool.stop_all(&self.listeners).await;
    }

    /// Find or open a shard with a free slot for `channel`
    pub(crate) async fn acquire_handle_for(
        self: &Arc<Self>,
        channel: &str,
    ) -> Result<SlotReservation<F::Connection>> {
        let _acquiring = self.pool.lock_acquisition().await;

        if let Some(slot) = self.pool.reserve_first_fit().await {
            tracing::debug!(
                channel = channel,
                shard = slot.handle().id(),
                "Joining on existing shard"
            );
            return Ok(slot);
        }

        let id = self.pool.next_id().await;
        tracing::info!(channel = channel, shard = id, "All shards full, creating new shard");
        let handle = self.create_handle(id).await?;
        Ok(SlotReservation::new(handle))
    }

    /// Open a connection for shard `id` and start its tasks
    ///
    /// Returns after the warm-up delay so the connection can finish its
    /// handshake before channels are joined on it.
    pub(crate) async fn create_handle(self: &Arc<Self>, id: u32) -> Result<Arc<Handle<F>>> {
        let creation_failed = |reason: String| Error::HandleCreationFailed { shard: id, reason };

        if self.pool.get(id).await.is_some() {
            return Err(creation_failed("a connection already exists with this id".into()));
        }

        let connection = self
            .factory
            .create(id)
            .map_err(|e| creation_failed(e.to_string()))?;
        connection.set_debug(self.config.debug);
        let inbound = connection
            .messages()
            .ok_or_else(|| creation_failed("message stream already taken".into()))?;
        let connection = Arc::new(connection);

        let (sink_tx, sink_rx) = mpsc::channel(self.config.message_buffer_size);
        let router = Router::new(
            id,
            Arc::clone(&self.control_channel),
            sink_tx,
            Arc::clone(&self.listeners),
        );
        let handle = Arc::new(ConnectionHandle::new(
            id,
            Arc::clone(&connection),
            router.clone(),
        ));
        self.pool.insert(Arc::clone(&handle)).await?;

        self.sink.start(id, sink_rx);
        tokio::spawn(async move {
            connection.run().await;
            tracing::debug!(shard = id, "Connection run loop exited");
        });
        tokio::spawn(router::run(router, inbound, self.dispatcher(Arc::clone(&handle))));

        tracing::info!(
            shard = id,
            warmup_ms = self.config.warmup.as_millis() as u64,
            "Shard started"
        );
        if !self.config.warmup.is_zero() {
            tokio::time::sleep(self.config.warmup).await;
        }

        Ok(handle)
    }

    /// Command dispatch callback for a shard's router
    fn dispatcher(
        self: &Arc<Self>,
        handle: Arc<Handle<F>>,
    ) -> impl Fn(SharedMessage) + Send + Sync + 'static {
        let logger = Arc::clone(self);
        move |msg| {
            tokio::spawn(Arc::clone(&logger).command_task(Arc::clone(&handle), msg));
        }
    }

    /// Boxed so the spawned command future has a nameable type
    fn command_task(
        self: Arc<Self>,
        handle: Arc<Handle<F>>,
        msg: SharedMessage,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move { self.run_command(&handle, &msg).await })
    }
}
