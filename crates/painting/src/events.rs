//! Edit notifications that invalidate a running preview.
//!
//! Collaborators (the path owner, the undo history) hold a clone of
//! [`EditEvents`] and call [`EditEvents::notify`]. Each [`Subscription`]
//! owns a dirty flag that notifications set; dropping the subscription
//! removes it from the hub.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

/// Something outside the painter changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditEvent {
    /// A path's curves or transform changed
    PathChanged,
    /// An undo or redo step was applied
    UndoPerformed,
}

struct Subscriber {
    id: u64,
    kinds: Vec<EditEvent>,
    pending: Arc<AtomicBool>,
}

#[derive(Default)]
struct Hub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Hub {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared notification hub. Clones refer to the same subscriber list.
#[derive(Clone, Default)]
pub struct EditEvents {
    hub: Arc<Hub>,
}

impl std::fmt::Debug for EditEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditEvents")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EditEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for `kinds`. The subscription ends when the guard is dropped.
    pub fn subscribe(&self, kinds: &[EditEvent]) -> Subscription {
        let id = self.hub.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::new(AtomicBool::new(false));
        self.hub.subscribers().push(Subscriber {
            id,
            kinds: kinds.to_vec(),
            pending: Arc::clone(&pending),
        });
        trace!("EditEvents: subscription {} for {:?}", id, kinds);
        Subscription {
            id,
            hub: Arc::clone(&self.hub),
            pending,
        }
    }

    /// Flag every subscriber listening for `event`
    pub fn notify(&self, event: EditEvent) {
        let subscribers = self.hub.subscribers();
        let mut reached = 0;
        for subscriber in subscribers.iter().filter(|s| s.kinds.contains(&event)) {
            subscriber.pending.store(true, Ordering::Release);
            reached += 1;
        }
        trace!("EditEvents: {:?} reached {} subscribers", event, reached);
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscribers().len()
    }
}

/// Live subscription; unsubscribes on drop.
pub struct Subscription {
    id: u64,
    hub: Arc<Hub>,
    pending: Arc<AtomicBool>,
}

impl Subscription {
    /// Whether a notification arrived since the last call, clearing the flag
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending", &self.pending.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.subscribers().retain(|s| s.id != self.id);
        trace!("EditEvents: subscription {} dropped", self.id);
    }
}
