//! Live message listeners
//!
//! Listeners are best-effort subscribers to the inbound stream. The set is
//! guarded by its own lock, held only to copy or mutate the sender list and
//! never across a delivery attempt.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::SharedMessage;

/// Identifier of a listener subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Receiving side of a subscription
///
/// `recv` returns `None` once the logger is stopped or the listener is
/// unsubscribed.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::Receiver<SharedMessage>,
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next message
    pub async fn recv(&mut self) -> Option<SharedMessage> {
        self.rx.recv().await
    }

    /// Take a message if one is queued
    pub fn try_recv(&mut self) -> Option<SharedMessage> {
        self.rx.try_recv().ok()
    }
}

/// Outcome of delivering one message to every listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    senders: Vec<(ListenerId, mpsc::Sender<SharedMessage>)>,
    closed: bool,
}

/// Registry of listener subscriptions
pub struct ListenerSet {
    inner: Mutex<Inner>,
    buffer: usize,
}

impl ListenerSet {
    /// Create a set whose subscriptions hold at most `buffer` messages
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new listener
    ///
    /// After [`close_all`](Self::close_all) the returned listener is already
    /// closed.
    pub fn subscribe(&self) -> Listener {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        if !inner.closed {
            inner.senders.push((id, tx));
        }
        tracing::debug!(listener = %id, listeners = inner.senders.len(), "Listener added");
        Listener { id, rx }
    }

    /// Remove a listener, closing its stream
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.senders.len();
        inner.senders.retain(|(lid, _)| *lid != id);
        let removed = inner.senders.len() != before;
        if removed {
            tracing::debug!(listener = %id, listeners = inner.senders.len(), "Listener removed");
        }
        removed
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer a message to every listener without blocking
    ///
    /// Full listeners miss the message. Listeners whose receiver was dropped
    /// are pruned.
    pub fn deliver(&self, msg: &SharedMessage) -> Delivery {
        let senders: Vec<_> = self.lock().senders.clone();
        if senders.is_empty() {
            return Delivery::default();
        }

        let mut delivery = Delivery::default();
        let mut gone = Vec::new();
        for (id, tx) in &senders {
            match tx.try_send(SharedMessage::clone(msg)) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => delivery.dropped += 1,
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }

        if !gone.is_empty() {
            let mut inner = self.lock();
            inner.senders.retain(|(id, _)| !gone.contains(id));
            tracing::debug!(pruned = gone.len(), "Pruned closed listeners");
        }

        delivery
    }

    /// Close every subscription; later subscriptions are closed immediately
    pub fn close_all(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        let count = inner.senders.len();
        inner.senders.clear();
        tracing::debug!(listeners = count, "Listeners closed");
    }
}
