//! Connection handles and slot reservations

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::protocol::ChatConnection;
use crate::router::Router;
use crate::stats::ShardStats;

/// One live protocol connection owned by the shard pool
///
/// The joined-channel set is always queried from the connection itself.
pub struct ConnectionHandle<C> {
    /// 1-based shard id
    id: u32,

    /// Underlying connection
    connection: Arc<C>,

    /// Router feeding this shard's sink and the shared listeners
    router: Router,

    /// Joins in flight on this handle
    reserved: AtomicUsize,
}

impl<C: ChatConnection> ConnectionHandle<C> {
    pub fn new(id: u32, connection: Arc<C>, router: Router) -> Self {
        Self {
            id,
            connection,
            router,
            reserved: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn stats(&self) -> ShardStats {
        self.router.stats().snapshot()
    }

    /// Channels currently joined on the connection
    pub async fn channels(&self) -> Vec<String> {
        self.connection.channels().await
    }

    /// Number of joins currently in flight
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }

    /// Occupied slots: joined channels plus in-flight joins
    pub async fn load(&self) -> usize {
        self.connection.channels().await.len() + self.reserved()
    }

    /// Stop the underlying connection
    pub fn stop(&self) {
        self.connection.stop();
    }
}

/// A claimed slot on a handle, held for the duration of a join
///
/// Dropping the reservation frees the slot; by then a successful join shows
/// up in the connection's channel set.
pub struct SlotReservation<C> {
    handle: Arc<ConnectionHandle<C>>,
}

impl<C> SlotReservation<C> {
    pub(crate) fn new(handle: Arc<ConnectionHandle<C>>) -> Self {
        handle.reserved.fetch_add(1, Ordering::AcqRel);
        Self { handle }
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle<C>> {
        &self.handle
    }
}

impl<C> Drop for SlotReservation<C> {
    fn drop(&mut self) {
        self.handle.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ListenerSet;
    use crate::testing::{test_router, MockConnection};

    fn handle(id: u32) -> Arc<ConnectionHandle<MockConnection>> {
        Arc::new(ConnectionHandle::new(
            id,
            Arc::new(MockConnection::new(id)),
            test_router(id, Arc::new(ListenerSet::new(1))),
        ))
    }

    #[tokio::test]
    async fn test_load_counts_reservations() {
        let handle = handle(1);
        handle.connection().join("foo").await.unwrap();
        assert_eq!(handle.load().await, 1);

        let slot = SlotReservation::new(Arc::clone(&handle));
        assert_eq!(handle.reserved(), 1);
        assert_eq!(handle.load().await, 2);

        drop(slot);
        assert_eq!(handle.reserved(), 0);
        assert_eq!(handle.load().await, 1);
    }

    #[tokio::test]
    async fn test_stop_reaches_connection() {
        let handle = handle(2);
        let state = handle.connection().state();

        handle.stop();
        assert!(state.is_stopped());
    }
}
