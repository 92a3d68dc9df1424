//! Plain-text chat log files
//!
//! Messages are appended to `<root>/<channel>/<YYYY-MM-DD>.txt`, one line per
//! message:
//!
//! ```text
//! [2024-03-01 18:04:12 UTC] nick: message text
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

use super::LogSink;
use crate::protocol::{Message, SharedMessage};

/// Sink writing per-channel, per-day log files
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LogSink for FileSink {
    fn start(&self, shard_id: u32, messages: mpsc::Receiver<SharedMessage>) {
        let writer = LogWriter::new(self.root.clone(), shard_id);
        tokio::spawn(writer.run(messages));
    }
}

/// Log file a message belongs to
pub fn log_path(root: &Path, msg: &Message) -> PathBuf {
    root.join(sanitize(&msg.channel))
        .join(format!("{}.txt", msg.received_at.format("%Y-%m-%d")))
}

/// Render a message as a log line, newline included
pub fn format_line(msg: &Message) -> String {
    format!(
        "[{}] {}: {}\n",
        msg.received_at.format("%Y-%m-%d %H:%M:%S UTC"),
        msg.nick,
        msg.text
    )
}

fn sanitize(channel: &str) -> String {
    let name: String = channel
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}

/// Per-shard writer task state
struct LogWriter {
    root: PathBuf,
    shard: u32,
    /// Open file per channel
    files: HashMap<String, (PathBuf, BufWriter<File>)>,
}

impl LogWriter {
    fn new(root: PathBuf, shard: u32) -> Self {
        Self {
            root,
            shard,
            files: HashMap::new(),
        }
    }

    async fn run(mut self, mut messages: mpsc::Receiver<SharedMessage>) {
        tracing::debug!(shard = self.shard, root = %self.root.display(), "File sink started");

        while let Some(msg) = messages.recv().await {
            self.write(&msg).await;
            while let Ok(msg) = messages.try_recv() {
                self.write(&msg).await;
            }
            self.flush().await;
        }

        self.flush().await;
        tracing::debug!(shard = self.shard, "File sink stopped");
    }

    async fn write(&mut self, msg: &Message) {
        let path = log_path(&self.root, msg);

        let stale = match self.files.get(&msg.channel) {
            Some((open, _)) => *open != path,
            None => true,
        };
        if stale {
            if let Some((_, mut old)) = self.files.remove(&msg.channel) {
                if let Err(e) = old.flush().await {
                    tracing::warn!(channel = %msg.channel, error = %e, "Failed to flush log file");
                }
            }
            match open_append(&path).await {
                Ok(file) => {
                    self.files
                        .insert(msg.channel.clone(), (path.clone(), BufWriter::new(file)));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to open log file");
                    return;
                }
            }
        }

        if let Some((_, writer)) = self.files.get_mut(&msg.channel) {
            if let Err(e) = writer.write_all(format_line(msg).as_bytes()).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write log line");
            }
        }
    }

    async fn flush(&mut self) {
        for (path, writer) in self.files.values_mut() {
            if let Err(e) = writer.flush().await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to flush log file");
            }
        }
    }
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn message_at(channel: &str, nick: &str, text: &str, day: u32) -> Message {
        let mut msg = Message::chat(channel, nick, text);
        msg.received_at = Utc.with_ymd_and_hms(2024, 3, day, 18, 4, 12).unwrap();
        msg
    }

    #[test]
    fn test_format_line() {
        let msg = message_at("destiny", "bob", "hello world", 1);
        assert_eq!(format_line(&msg), "[2024-03-01 18:04:12 UTC] bob: hello world\n");
    }

    #[test]
    fn test_log_path_sanitizes_channel() {
        let root = Path::new("/logs");
        let msg = message_at("../etc", "bob", "x", 1);

        assert_eq!(log_path(root, &msg), PathBuf::from("/logs/___etc/2024-03-01.txt"));
        assert_eq!(sanitize(""), "_");
    }

    #[tokio::test]
    async fn test_writer_appends_per_channel_and_day() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel(16);

        tx.send(Arc::new(message_at("foo", "a", "one", 1))).await.unwrap();
        tx.send(Arc::new(message_at("foo", "b", "two", 1))).await.unwrap();
        tx.send(Arc::new(message_at("bar", "c", "three", 1))).await.unwrap();
        tx.send(Arc::new(message_at("foo", "d", "four", 2))).await.unwrap();
        drop(tx);

        LogWriter::new(dir.path().to_path_buf(), 1).run(rx).await;

        let foo_day1 = std::fs::read_to_string(dir.path().join("foo/2024-03-01.txt")).unwrap();
        assert_eq!(
            foo_day1,
            "[2024-03-01 18:04:12 UTC] a: one\n[2024-03-01 18:04:12 UTC] b: two\n"
        );
        let foo_day2 = std::fs::read_to_string(dir.path().join("foo/2024-03-02.txt")).unwrap();
        assert_eq!(foo_day2, "[2024-03-02 18:04:12 UTC] d: four\n");
        let bar = std::fs::read_to_string(dir.path().join("bar/2024-03-01.txt")).unwrap();
        assert_eq!(bar, "[2024-03-01 18:04:12 UTC] c: three\n");
    }

    #[tokio::test]
    async fn test_sink_start_spawns_writer() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());
        let (tx, rx) = mpsc::channel(4);
        sink.start(1, rx);

        tx.send(Arc::new(message_at("foo", "a", "hi", 5))).await.unwrap();

        let path = dir.path().join("foo/2024-03-05.txt");
        let mut content = String::new();
        for _ in 0..50 {
            content = std::fs::read_to_string(&path).unwrap_or_default();
            if !content.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(content, "[2024-03-05 18:04:12 UTC] a: hi\n");
    }
}
