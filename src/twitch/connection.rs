//! Twitch IRC connection
//!
//! ```text
//!   join/leave/send ──► outgoing queue ──┐
//!                                        ▼
//!   run() ── connect ── PASS/NICK/CAP ── JOIN known ── session loop ──► messages()
//!     ▲                                                   │
//!     └──────────── reconnect_delay ◄── disconnected ─────┘
//! ```
//!
//! The joined set is kept locally and replayed after every reconnect. Twitch
//! channel names are lowercase, so names are lowercased on the way in.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};

use super::codec::LineCodec;
use super::config::TwitchConfig;
use super::irc::{self, IrcLine};
use crate::protocol::{ChatConnection, ConnectionError, ConnectionFactory, Message};

/// Why a session ended
#[derive(Debug)]
enum SessionEnd {
    Stopped,
    Disconnected(String),
}

#[derive(Debug, Default)]
struct Membership {
    joined: BTreeSet<String>,
    /// Registration sent on the current socket
    connected: bool,
}

/// One IRC connection to Twitch chat
pub struct TwitchConnection {
    shard: u32,
    config: TwitchConfig,
    membership: Mutex<Membership>,
    outgoing: mpsc::Sender<String>,
    outgoing_rx: Mutex<Option<mpsc::Receiver<String>>>,
    inbound_tx: Mutex<Option<mpsc::Sender<Message>>>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    shutdown: watch::Sender<bool>,
    debug: AtomicBool,
}

impl TwitchConnection {
    pub fn new(shard: u32, config: TwitchConfig) -> Self {
        let buffer = config.message_buffer.max(1);
        let (outgoing, outgoing_rx) = mpsc::channel(buffer);
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer);
        let (shutdown, _) = watch::channel(false);

        Self {
            shard,
            config,
            membership: Mutex::new(Membership::default()),
            outgoing,
            outgoing_rx: Mutex::new(Some(outgoing_rx)),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            shutdown,
            debug: AtomicBool::new(false),
        }
    }

    pub fn shard(&self) -> u32 {
        self.shard
    }

    fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn membership(&self) -> std::sync::MutexGuard<'_, Membership> {
        self.membership
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn queue(&self, line: String) -> Result<(), ConnectionError> {
        self.outgoing
            .send(line)
            .await
            .map_err(|_| ConnectionError::NotConnected)
    }

    async fn write_line(
        &self,
        writer: &mut FramedWrite<OwnedWriteHalf, LineCodec>,
        line: String,
    ) -> std::io::Result<()> {
        if self.debug.load(Ordering::Relaxed) {
            let shown = if line.starts_with("PASS ") { "PASS ***" } else { line.as_str() };
            tracing::debug!(shard = self.shard, line = shown, ">>");
        }
        writer.send(line).await
    }

    /// Register on a fresh socket, then pump lines until it ends
    async fn session(
        &self,
        stream: TcpStream,
        outgoing: &mut mpsc::Receiver<String>,
        inbound: &mpsc::Sender<Message>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (reader, writer) = stream.into_split();
        let mut reader = FramedRead::new(reader, LineCodec::default());
        let mut writer = FramedWrite::new(writer, LineCodec::default());

        let mut registration = Vec::new();
        if !self.config.oauth.is_empty() {
            registration.push(format!("PASS {}", self.config.oauth));
        }
        registration.push(format!("NICK {}", self.config.nick));
        registration.push("CAP REQ :twitch.tv/commands".to_string());
        let rejoined = {
            let mut membership = self.membership();
            membership.connected = true;
            registration.extend(membership.joined.iter().map(|c| irc::join_line(c)));
            membership.joined.len()
        };

        for line in registration {
            if let Err(e) = self.write_line(&mut writer, line).await {
                return SessionEnd::Disconnected(e.to_string());
            }
        }
        tracing::info!(
            shard = self.shard,
            channels = rejoined,
            "Connected to chat"
        );

        loop {
            tokio::select! {
                _ = stopped(shutdown) => {
                    let _ = self.write_line(&mut writer, "QUIT".to_string()).await;
                    return SessionEnd::Stopped;
                }
                line = outgoing.recv() => {
                    let Some(line) = line else {
                        return SessionEnd::Stopped;
                    };
                    if let Err(e) = self.write_line(&mut writer, line).await {
                        return SessionEnd::Disconnected(e.to_string());
                    }
                }
                raw = reader.next() => {
                    let raw = match raw {
                        Some(Ok(raw)) => raw,
                        Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                        None => return SessionEnd::Disconnected("closed by server".into()),
                    };
                    if self.debug.load(Ordering::Relaxed) {
                        tracing::debug!(shard = self.shard, line = %raw, "<<");
                    }
                    let Some(line) = IrcLine::parse(&raw) else {
                        continue;
                    };

                    match line.command.as_str() {
                        "PING" => {
                            let pong = irc::pong_line(&line);
                            if let Err(e) = self.write_line(&mut writer, pong).await {
                                return SessionEnd::Disconnected(e.to_string());
                            }
                        }
                        "RECONNECT" => {
                            return SessionEnd::Disconnected("server requested reconnect".into());
                        }
                        "NOTICE" if line.param(0) == Some("*") => {
                            tracing::warn!(
                                shard = self.shard,
                                notice = line.param(1).unwrap_or_default(),
                                "Server notice"
                            );
                        }
                        _ => {
                            if let Some(msg) = line.to_message() {
                                if inbound.send(msg).await.is_err() {
                                    tracing::trace!(shard = self.shard, "Message stream dropped");
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ChatConnection for TwitchConnection {
    async fn join(&self, channel: &str) -> Result<(), ConnectionError> {
        if self.is_stopped() {
            return Err(ConnectionError::NotConnected);
        }

        let channel = channel.to_lowercase();
        let connected = {
            let mut membership = self.membership();
            if !membership.joined.insert(channel.clone()) {
                return Ok(());
            }
            membership.connected
        };

        // Otherwise the JOIN goes out with the registration
        if connected {
            if let Err(e) = self.queue(irc::join_line(&channel)).await {
                self.membership().joined.remove(&channel);
                return Err(e);
            }
        }
        Ok(())
    }

    async fn leave(&self, channel: &str) -> Result<(), ConnectionError> {
        let channel = channel.to_lowercase();
        let connected = {
            let mut membership = self.membership();
            if !membership.joined.remove(&channel) {
                return Err(ConnectionError::NotJoined(channel));
            }
            membership.connected
        };

        if connected {
            self.queue(irc::part_line(&channel)).await?;
        }
        Ok(())
    }

    async fn send(&self, channel: &str, text: &str) {
        if let Err(e) = self.queue(irc::privmsg_line(channel, text)).await {
            tracing::debug!(shard = self.shard, channel = channel, error = %e, "Dropped outgoing message");
        }
    }

    async fn channels(&self) -> Vec<String> {
        self.membership().joined.iter().cloned().collect()
    }

    fn messages(&self) -> Option<mpsc::Receiver<Message>> {
        self.inbound_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    async fn run(&self) {
        let outgoing = self
            .outgoing_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let inbound = self
            .inbound_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let (Some(mut outgoing), Some(inbound)) = (outgoing, inbound) else {
            tracing::warn!(shard = self.shard, "Connection already running");
            return;
        };
        let mut shutdown = self.shutdown.subscribe();

        while !self.is_stopped() {
            let connect = tokio::select! {
                _ = stopped(&mut shutdown) => break,
                connect = TcpStream::connect(&self.config.addr) => connect,
            };

            let end = match connect {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    self.session(stream, &mut outgoing, &inbound, &mut shutdown)
                        .await
                }
                Err(e) => SessionEnd::Disconnected(e.to_string()),
            };
            self.membership().connected = false;

            match end {
                SessionEnd::Stopped => break,
                SessionEnd::Disconnected(reason) => {
                    tracing::warn!(
                        shard = self.shard,
                        addr = %self.config.addr,
                        reason = %reason,
                        retry_in_ms = self.config.reconnect_delay.as_millis() as u64,
                        "Disconnected from chat"
                    );
                }
            }

            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        tracing::info!(shard = self.shard, "Connection stopped");
    }

    fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }
}

/// Resolves once `stop` has been called
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

/// Creates one [`TwitchConnection`] per shard from a shared config
#[derive(Debug, Clone, Default)]
pub struct TwitchFactory {
    config: TwitchConfig,
}

impl TwitchFactory {
    pub fn new(config: TwitchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TwitchConfig {
        &self.config
    }
}

impl ConnectionFactory for TwitchFactory {
    type Connection = TwitchConnection;

    fn create(&self, shard_id: u32) -> Result<TwitchConnection, ConnectionError> {
        if self.config.addr.is_empty() {
            return Err(ConnectionError::Rejected("no server address configured".into()));
        }
        Ok(TwitchConnection::new(shard_id, self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::net::TcpListener;

    use super::*;
    use crate::protocol::MessageKind;

    async fn fake_server() -> (TcpListener, TwitchConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = TwitchConfig::default()
            .addr(listener.local_addr().unwrap().to_string())
            .nick("logbot")
            .oauth("oauth:secret")
            .reconnect_delay(Duration::from_millis(20));
        (listener, config)
    }

    async fn accept(listener: &TcpListener) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
        let (socket, _) = listener.accept().await.unwrap();
        let (reader, writer) = socket.into_split();
        (BufReader::new(reader).lines(), writer)
    }

    /// Read lines until one satisfies `pred`
    async fn expect_line(
        lines: &mut Lines<BufReader<OwnedReadHalf>>,
        pred: impl Fn(&str) -> bool,
    ) -> String {
        let read = async {
            loop {
                let line = lines.next_line().await.unwrap().unwrap();
                if pred(&line) {
                    return line;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), read)
            .await
            .expect("expected line never arrived")
    }

    #[tokio::test]
    async fn test_leave_unknown_channel() {
        let conn = TwitchConnection::new(1, TwitchConfig::default());

        assert_eq!(
            conn.leave("foo").await,
            Err(ConnectionError::NotJoined("foo".into()))
        );
    }

    #[tokio::test]
    async fn test_join_before_connect_tracks_channel() {
        let conn = TwitchConnection::new(1, TwitchConfig::default());

        conn.join("foo").await.unwrap();
        conn.join("bar").await.unwrap();
        assert_eq!(conn.channels().await, vec!["bar", "foo"]);

        conn.leave("foo").await.unwrap();
        assert_eq!(conn.channels().await, vec!["bar"]);
    }

    #[tokio::test]
    async fn test_channel_names_lowercased() {
        let conn = TwitchConnection::new(1, TwitchConfig::default());

        conn.join("Foo").await.unwrap();
        conn.join("FOO").await.unwrap();
        assert_eq!(conn.channels().await, vec!["foo"]);

        conn.leave("fOo").await.unwrap();
        assert!(conn.channels().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_after_stop_fails() {
        let conn = TwitchConnection::new(1, TwitchConfig::default());
        conn.stop();

        assert_eq!(conn.join("foo").await, Err(ConnectionError::NotConnected));
    }

    #[tokio::test]
    async fn test_messages_taken_once() {
        let conn = TwitchConnection::new(1, TwitchConfig::default());

        assert!(conn.messages().is_some());
        assert!(conn.messages().is_none());
    }

    #[tokio::test]
    async fn test_factory_rejects_empty_addr() {
        let factory = TwitchFactory::new(TwitchConfig::default().addr(""));
        assert!(factory.create(1).is_err());

        let factory = TwitchFactory::default();
        assert_eq!(factory.create(3).unwrap().shard(), 3);
    }

    #[tokio::test]
    async fn test_session_end_to_end() {
        let (listener, config) = fake_server().await;
        let conn = std::sync::Arc::new(TwitchConnection::new(1, config));
        let mut messages = conn.messages().unwrap();
        conn.join("foo").await.unwrap();

        let runner = std::sync::Arc::clone(&conn);
        let run = tokio::spawn(async move { runner.run().await });

        let (mut lines, mut writer) = accept(&listener).await;
        assert_eq!(expect_line(&mut lines, |_| true).await, "PASS oauth:secret");
        assert_eq!(expect_line(&mut lines, |_| true).await, "NICK logbot");
        expect_line(&mut lines, |l| l == "JOIN #foo").await;

        writer
            .write_all(b"PING :tmi.twitch.tv\r\n:bob!bob@host PRIVMSG #foo :hi there\r\n")
            .await
            .unwrap();
        expect_line(&mut lines, |l| l == "PONG :tmi.twitch.tv").await;

        let msg = tokio::time::timeout(Duration::from_secs(2), messages.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.channel, "foo");
        assert_eq!(msg.nick, "bob");
        assert_eq!(msg.text, "hi there");

        conn.join("bar").await.unwrap();
        expect_line(&mut lines, |l| l == "JOIN #bar").await;
        conn.send("foo", "Logging bar").await;
        expect_line(&mut lines, |l| l == "PRIVMSG #foo :Logging bar").await;
        conn.leave("Bar").await.unwrap();
        expect_line(&mut lines, |l| l == "PART #bar").await;

        conn.stop();
        tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .unwrap()
            .unwrap();
        // Stream closes once the run loop is gone
        assert!(messages.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_rejoins_after_reconnect() {
        let (listener, config) = fake_server().await;
        let conn = std::sync::Arc::new(TwitchConnection::new(2, config));
        conn.join("Foo").await.unwrap();

        let runner = std::sync::Arc::clone(&conn);
        let run = tokio::spawn(async move { runner.run().await });

        let (mut lines, writer) = accept(&listener).await;
        expect_line(&mut lines, |l| l == "JOIN #foo").await;
        drop(writer);
        drop(lines);

        let (mut lines, _writer) = accept(&listener).await;
        expect_line(&mut lines, |l| l == "NICK logbot").await;
        expect_line(&mut lines, |l| l == "JOIN #foo").await;

        conn.stop();
        tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .unwrap()
            .unwrap();
    }
}
