//! Persisted channel roster
//!
//! Wraps a [`ChannelList`] in a single exclusive lock. Every mutation and the
//! file write that follows it happen under that lock, so the file never
//! reflects a state the in-memory list did not pass through.
//!
//! A channel being joined is claimed before it is recorded. Claims are
//! checked together with the roster under the same lock, so two joins of
//! one channel cannot both get past the membership check.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::list::ChannelList;
use crate::error::{Error, Result};

/// Durable set of monitored channels
pub struct ChannelRoster {
    /// Backing file
    path: PathBuf,

    /// Current channels
    channels: Mutex<ChannelList>,

    /// Channels with a join in flight
    claims: std::sync::Mutex<ChannelList>,
}

/// Exclusive right to record a channel, released on drop
pub struct ChannelClaim<'a> {
    roster: &'a ChannelRoster,
    name: String,
}

impl ChannelClaim<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ChannelClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut claims) = self.roster.claims.lock() {
            claims.remove(&self.name);
        }
    }
}

impl ChannelRoster {
    /// Create a roster backed by `path` with the given initial channels
    ///
    /// Nothing is written until the first mutation.
    pub fn new(path: impl Into<PathBuf>, channels: ChannelList) -> Self {
        Self {
            path: path.into(),
            channels: Mutex::new(channels),
            claims: std::sync::Mutex::new(ChannelList::new()),
        }
    }

    /// Load the roster from its backing file
    ///
    /// A missing file yields an empty roster; malformed content is an error.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let channels = match tokio::fs::read(&path).await {
            Ok(data) => ChannelList::from_json(&data).map_err(|e| {
                Error::Config(format!("malformed roster {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Roster file not found, starting empty");
                ChannelList::new()
            }
            Err(e) => return Err(Error::Io(e)),
        };

        tracing::info!(
            path = %path.display(),
            channels = channels.len(),
            "Roster loaded"
        );

        Ok(Self::new(path, channels))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Case-insensitive membership test
    pub async fn contains(&self, name: &str) -> bool {
        self.channels.lock().await.contains(name)
    }

    /// Claim a channel that is neither recorded nor already claimed
    ///
    /// Returns `None` if either holds. The claim lasts until the returned
    /// guard is dropped; record the channel with [`insert`](Self::insert)
    /// before dropping it.
    pub async fn claim(&self, name: &str) -> Option<ChannelClaim<'_>> {
        let channels = self.channels.lock().await;
        if channels.contains(name) {
            return None;
        }
        let mut claims = self.claims.lock().ok()?;
        if !claims.add(name) {
            return None;
        }
        drop(claims);
        drop(channels);

        tracing::debug!(channel = name, "Channel claimed");
        Some(ChannelClaim {
            roster: self,
            name: name.to_string(),
        })
    }

    /// Whether a join of `name` is in flight
    pub fn is_claimed(&self, name: &str) -> bool {
        self.claims
            .lock()
            .map(|claims| claims.contains(name))
            .unwrap_or(false)
    }

    /// Sorted copy of the current channels
    pub async fn snapshot(&self) -> Vec<String> {
        let mut channels = self.channels.lock().await.clone();
        channels.sort();
        channels.to_vec()
    }

    pub async fn len(&self) -> usize {
        self.channels.lock().await.len()
    }

    /// Add a channel and persist
    ///
    /// Returns `Ok(false)` without writing if the channel was already present.
    /// On a persistence failure the channel stays added in memory.
    pub async fn insert(&self, name: &str) -> Result<bool> {
        let mut channels = self.channels.lock().await;
        if !channels.add(name) {
            return Ok(false);
        }
        tracing::debug!(channel = name, "Channel added to roster");
        write_list(&self.path, &mut channels).await?;
        Ok(true)
    }

    /// Remove a channel and persist
    ///
    /// Returns `Ok(false)` without writing if the channel was not present.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let mut channels = self.channels.lock().await;
        if !channels.remove(name) {
            return Ok(false);
        }
        tracing::debug!(channel = name, "Channel removed from roster");
        write_list(&self.path, &mut channels).await?;
        Ok(true)
    }

    /// Write the current roster to its backing file
    pub async fn persist(&self) -> Result<()> {
        let mut channels = self.channels.lock().await;
        write_list(&self.path, &mut channels).await
    }
}

/// Sort and write via a temp file and rename
async fn write_list(path: &Path, channels: &mut ChannelList) -> Result<()> {
    channels.sort();
    let data = channels
        .to_json()
        .map_err(|e| Error::PersistenceFailed(e.to_string()))?;

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &data)
        .await
        .map_err(|e| Error::PersistenceFailed(format!("{}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::PersistenceFailed(format!("{}: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), channels = channels.len(), "Roster persisted");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "roster".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let roster = ChannelRoster::load(dir.path().join("channels.json"))
            .await
            .unwrap();

        assert_eq!(roster.len().await, 0);
    }

    #[tokio::test]
    async fn test_load_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, "not json").unwrap();

        let result = ChannelRoster::load(&path).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_load_sorts_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, r#"["foo", "bar"]"#).unwrap();

        let roster = ChannelRoster::load(&path).await.unwrap();
        assert_eq!(roster.snapshot().await, vec!["bar", "foo"]);
    }

    #[tokio::test]
    async fn test_insert_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        let roster = ChannelRoster::new(&path, ChannelList::from_names(["foo"]));

        assert!(assert_ok!(roster.insert("bar").await));
        assert!(!assert_ok!(roster.insert("BAR").await));

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "[\n\t\"bar\",\n\t\"foo\"\n]");
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        let roster = ChannelRoster::new(&path, ChannelList::from_names(["foo", "bar"]));

        assert!(assert_ok!(roster.remove("Foo").await));
        assert!(!assert_ok!(roster.remove("foo").await));
        assert!(!roster.contains("foo").await);

        let reloaded = ChannelRoster::load(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().await, vec!["bar"]);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let roster = ChannelRoster::new(
            dir.path().join("channels.json"),
            ChannelList::from_names(["foo"]),
        );

        assert!(roster.claim("FOO").await.is_none());

        let claim = roster.claim("bar").await.unwrap();
        assert_eq!(claim.name(), "bar");
        assert!(roster.is_claimed("BAR"));
        assert!(roster.claim("Bar").await.is_none());
        assert!(!roster.contains("bar").await);

        drop(claim);
        assert!(!roster.is_claimed("bar"));
        assert!(roster.claim("bar").await.is_some());
    }

    #[tokio::test]
    async fn test_claimed_channel_recorded_then_released() {
        let dir = TempDir::new().unwrap();
        let roster = ChannelRoster::new(dir.path().join("channels.json"), ChannelList::new());
        let claim = roster.claim("bar").await.unwrap();
        assert!(assert_ok!(roster.insert(claim.name()).await));
        drop(claim);

        assert!(!roster.is_claimed("bar"));
        assert!(roster.claim("bar").await.is_none());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.json");
        let roster = ChannelRoster::new(&path, ChannelList::from_names(["Zeta", "alpha", "beta"]));
        roster.persist().await.unwrap();

        let reloaded = ChannelRoster::load(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().await, vec!["Zeta", "alpha", "beta"]);
        for name in ["zeta", "ALPHA", "Beta"] {
            assert!(reloaded.contains(name).await);
        }
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("channels.json");
        let roster = ChannelRoster::new(&path, ChannelList::new());

        let result = roster.insert("foo").await;
        assert!(matches!(assert_err!(result), Error::PersistenceFailed(_)));
        assert!(roster.contains("foo").await);
    }
}
