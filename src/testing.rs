//! In-memory collaborators for unit tests

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};

use crate::directory::ChannelDirectory;
use crate::logger::{ChatLogger, LoggerConfig};
use crate::protocol::{ChatConnection, ConnectionError, ConnectionFactory, Message, SharedMessage};
use crate::roster::{ChannelList, ChannelRoster};
use crate::router::{ListenerSet, Router};
use crate::shard::ConnectionHandle;
use crate::sink::LogSink;

/// Router whose sink queue is discarded
pub fn test_router(id: u32, listeners: Arc<ListenerSet>) -> Router {
    let (sink, _) = mpsc::channel(1);
    Router::new(id, Arc::from("control"), sink, listeners)
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn wait_for(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Observable state of a [`MockConnection`]
#[derive(Default)]
pub struct MockState {
    channels: Mutex<BTreeSet<String>>,
    join_order: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, String)>>,
    failing_joins: AtomicU32,
    join_calls: AtomicUsize,
    leave_calls: AtomicUsize,
    stopped: AtomicBool,
    debug: AtomicBool,
    stop_signal: Notify,
    inbound: Mutex<Option<mpsc::Sender<Message>>>,
}

impl MockState {
    /// Make the next `n` joins fail with a transport error
    pub fn fail_next_joins(&self, n: u32) {
        self.failing_joins.store(n, Ordering::SeqCst);
    }

    pub fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub fn leave_calls(&self) -> usize {
        self.leave_calls.load(Ordering::SeqCst)
    }

    /// Joined channels, sorted
    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().unwrap().iter().cloned().collect()
    }

    /// Successful joins in call order
    pub fn join_order(&self) -> Vec<String> {
        self.join_order.lock().unwrap().clone()
    }

    /// Messages sent through the connection as `(channel, text)`
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    /// Whether the inbound stream is still open on the connection side
    pub fn has_inbound(&self) -> bool {
        self.inbound.lock().unwrap().is_some()
    }

    /// Feed an inbound message; false once the connection has closed
    pub async fn push(&self, msg: Message) -> bool {
        let sender = self.inbound.lock().unwrap().clone();
        match sender {
            Some(sender) => sender.send(msg).await.is_ok(),
            None => false,
        }
    }
}

/// Connection that joins anything and records what it was asked to do
///
/// Channel names are lowercased like on Twitch.
pub struct MockConnection {
    state: Arc<MockState>,
    messages: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl MockConnection {
    pub fn new(_shard: u32) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let state = MockState {
            inbound: Mutex::new(Some(tx)),
            ..Default::default()
        };
        Self {
            state: Arc::new(state),
            messages: Mutex::new(Some(rx)),
        }
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl ChatConnection for MockConnection {
    async fn join(&self, channel: &str) -> Result<(), ConnectionError> {
        self.state.join_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.is_stopped() {
            return Err(ConnectionError::NotConnected);
        }

        let failing = self.state.failing_joins.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_joins.store(failing - 1, Ordering::SeqCst);
            return Err(ConnectionError::Transport("join timed out".into()));
        }

        // Let concurrent joins interleave
        tokio::task::yield_now().await;

        let channel = channel.to_lowercase();
        self.state.channels.lock().unwrap().insert(channel.clone());
        self.state.join_order.lock().unwrap().push(channel);
        Ok(())
    }

    async fn leave(&self, channel: &str) -> Result<(), ConnectionError> {
        self.state.leave_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.channels.lock().unwrap().remove(&channel.to_lowercase()) {
            Ok(())
        } else {
            Err(ConnectionError::NotJoined(channel.to_string()))
        }
    }

    async fn send(&self, channel: &str, text: &str) {
        self.state
            .sent
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
    }

    async fn channels(&self) -> Vec<String> {
        self.state.channels()
    }

    fn messages(&self) -> Option<mpsc::Receiver<Message>> {
        self.messages.lock().unwrap().take()
    }

    async fn run(&self) {
        loop {
            let stopped = self.state.stop_signal.notified();
            if self.state.is_stopped() {
                break;
            }
            stopped.await;
        }
        self.state.inbound.lock().unwrap().take();
    }

    fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        self.state.stop_signal.notify_waiters();
    }

    fn set_debug(&self, debug: bool) {
        self.state.debug.store(debug, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FactoryInner {
    states: Mutex<BTreeMap<u32, Arc<MockState>>>,
    join_failures: AtomicU32,
    failing_ids: Mutex<HashSet<u32>>,
}

/// Factory producing [`MockConnection`]s and keeping their state
#[derive(Clone, Default)]
pub struct MockFactory {
    inner: Arc<FactoryInner>,
}

impl MockFactory {
    /// State of the connection created for shard `id`
    pub fn state(&self, id: u32) -> Option<Arc<MockState>> {
        self.inner.states.lock().unwrap().get(&id).cloned()
    }

    /// Connections created from now on fail their first `n` joins
    pub fn fail_joins_on_new_connections(&self, n: u32) {
        self.inner.join_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next creation of shard `id`
    pub fn fail_creation(&self, id: u32) {
        self.inner.failing_ids.lock().unwrap().insert(id);
    }
}

impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    fn create(&self, shard_id: u32) -> Result<MockConnection, ConnectionError> {
        if self.inner.failing_ids.lock().unwrap().remove(&shard_id) {
            return Err(ConnectionError::Transport("connection refused".into()));
        }

        let connection = MockConnection::new(shard_id);
        let state = connection.state();
        state.fail_next_joins(self.inner.join_failures.load(Ordering::SeqCst));
        self.inner.states.lock().unwrap().insert(shard_id, state);
        Ok(connection)
    }
}

/// Directory answering from a fixed set of channel names
#[derive(Clone, Default)]
pub struct MockDirectory {
    known: Arc<HashSet<String>>,
    calls: Arc<AtomicUsize>,
}

impl MockDirectory {
    pub fn new(known: &[&str]) -> Self {
        Self {
            known: Arc::new(known.iter().map(|c| c.to_string()).collect()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelDirectory for MockDirectory {
    async fn exists(&self, channel: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.known.contains(channel)
    }
}

/// Sink collecting every message it is handed
#[derive(Clone, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<(u32, SharedMessage)>>>,
    started: Arc<Mutex<Vec<u32>>>,
}

impl CollectingSink {
    /// Collected messages as `(shard, message)`
    pub fn messages(&self) -> Vec<(u32, SharedMessage)> {
        self.messages.lock().unwrap().clone()
    }

    /// Shards whose queue was handed over, in start order
    pub fn started(&self) -> Vec<u32> {
        self.started.lock().unwrap().clone()
    }
}

impl LogSink for CollectingSink {
    fn start(&self, shard_id: u32, mut messages: mpsc::Receiver<SharedMessage>) {
        self.started.lock().unwrap().push(shard_id);
        let collected = Arc::clone(&self.messages);
        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                collected.lock().unwrap().push((shard_id, msg));
            }
        });
    }
}

/// Logger wired to mocks, with handles on every collaborator
pub struct TestLogger {
    pub logger: Arc<ChatLogger<MockFactory>>,
    pub factory: MockFactory,
    pub directory: MockDirectory,
    pub sink: CollectingSink,
    dir: TempDir,
}

impl TestLogger {
    pub fn roster_path(&self) -> PathBuf {
        self.dir.path().join("channels.json")
    }

    /// Join the control channel unvalidated and return the shard hosting it
    pub async fn control_shard(&self) -> Arc<ConnectionHandle<MockConnection>> {
        self.logger.join("control", false).await.unwrap();
        for handle in self.logger.pool().handles().await {
            if handle.channels().await.iter().any(|c| c == "control") {
                return handle;
            }
        }
        panic!("control channel not joined");
    }
}

/// Build a logger with the given roster, shard capacity and known channels
///
/// The control channel is `control`, the only admin is `admin` and there is
/// no warm-up delay.
pub async fn logger_with(roster: &[&str], capacity: usize, known: &[&str]) -> TestLogger {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("channels.json");

    let config = LoggerConfig::default()
        .admins(["admin"])
        .command_channel("control")
        .channel_list_path(&path)
        .max_channels_per_connection(capacity)
        .warmup(Duration::ZERO);
    let roster = ChannelRoster::new(path, ChannelList::from_names(roster.iter().copied()));

    let factory = MockFactory::default();
    let directory = MockDirectory::new(known);
    let sink = CollectingSink::default();
    let logger = ChatLogger::new(
        config,
        roster,
        factory.clone(),
        directory.clone(),
        sink.clone(),
    )
    .unwrap();

    TestLogger {
        logger,
        factory,
        directory,
        sink,
        dir,
    }
}
