//! Connection shard pool
//!
//! Maps shard ids to connection handles and decides which handle hosts a new
//! channel. Selection is first-fit in ascending id order so low-numbered
//! shards fill up before a new connection is opened.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::handle::{ConnectionHandle, SlotReservation};
use crate::error::{Error, Result};
use crate::protocol::ChatConnection;
use crate::router::ListenerSet;

/// Pool of connection handles keyed by shard id
pub struct ShardPool<C> {
    /// Handles by shard id
    handles: RwLock<BTreeMap<u32, Arc<ConnectionHandle<C>>>>,

    /// Serializes select-or-create so two joins never race for the last slot
    acquisition: Mutex<()>,

    /// Maximum channels per connection
    capacity: usize,
}

impl<C: ChatConnection> ShardPool<C> {
    /// Create an empty pool
    pub fn new(capacity: usize) -> Self {
        Self {
            handles: RwLock::new(BTreeMap::new()),
            acquisition: Mutex::new(()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lock out concurrent slot acquisition
    ///
    /// Held by the caller across [`reserve_first_fit`](Self::reserve_first_fit)
    /// and, when that finds nothing, the creation of the next handle.
    pub async fn lock_acquisition(&self) -> MutexGuard<'_, ()> {
        self.acquisition.lock().await
    }

    /// Reserve a slot on the first handle below capacity
    pub async fn reserve_first_fit(&self) -> Option<SlotReservation<C>> {
        for handle in self.handles().await {
            let load = handle.load().await;
            if load < self.capacity {
                tracing::trace!(shard = handle.id(), load = load, "Shard has free slot");
                return Some(SlotReservation::new(handle));
            }
        }
        None
    }

    /// Id the next handle should be created with
    pub async fn next_id(&self) -> u32 {
        self.handles
            .read()
            .await
            .keys()
            .next_back()
            .map_or(1, |id| id + 1)
    }

    /// Register a handle under its shard id
    pub async fn insert(&self, handle: Arc<ConnectionHandle<C>>) -> Result<()> {
        let mut handles = self.handles.write().await;
        let id = handle.id();
        if handles.contains_key(&id) {
            return Err(Error::HandleCreationFailed {
                shard: id,
                reason: "a connection already exists with this id".into(),
            });
        }
        handles.insert(id, handle);
        tracing::debug!(shard = id, shards = handles.len(), "Shard registered");
        Ok(())
    }

    pub async fn get(&self, id: u32) -> Option<Arc<ConnectionHandle<C>>> {
        self.handles.read().await.get(&id).cloned()
    }

    /// Snapshot of all handles in ascending id order
    pub async fn handles(&self) -> Vec<Arc<ConnectionHandle<C>>> {
        self.handles.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    /// Stop every handle, then close every listener
    ///
    /// Both happen under the pool's write lock.
    pub async fn stop_all(&self, listeners: &ListenerSet) {
        let handles = self.handles.write().await;
        for (id, handle) in handles.iter() {
            tracing::info!(shard = id, "Stopping shard");
            handle.stop();
        }
        listeners.close_all();
    }
}
