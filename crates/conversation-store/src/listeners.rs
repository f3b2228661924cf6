//! Listener registration and snapshot fan-out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Notify;
use tracing::trace;

use crate::store::Shared;

/// Callback receiving an owned snapshot of a sequence.
pub type Listener<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Which sequence a listener observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Messages,
    Contacts,
}

/// Registration-ordered listener list with stable ids.
pub(crate) struct Listeners<T> {
    next_id: u64,
    /// Sequence number of the last captured snapshot.
    seq: u64,
    entries: Vec<(u64, Listener<T>)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            seq: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> Listeners<T> {
    pub(crate) fn add(&mut self, listener: Listener<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Clone the listener handles so they can be invoked without the store lock.
    pub(crate) fn handles(&self) -> Vec<Listener<T>> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

/// Listeners paired with the snapshot they are about to receive.
pub(crate) struct Pending<T> {
    seq: u64,
    listeners: Vec<Listener<T>>,
    snapshot: Vec<T>,
}

impl<T: Clone> Pending<T> {
    /// Capture a snapshot only when someone is listening.
    ///
    /// Must be called with the store lock held so that sequence numbers follow
    /// mutation order.
    pub(crate) fn capture(listeners: &mut Listeners<T>, items: impl FnOnce() -> Vec<T>) -> Option<Self> {
        if listeners.is_empty() {
            return None;
        }
        listeners.seq += 1;
        Some(Self {
            seq: listeners.seq,
            listeners: listeners.handles(),
            snapshot: items(),
        })
    }

    /// Deliver the snapshot to every listener in registration order.
    pub(crate) fn deliver(self) {
        for listener in &self.listeners {
            listener(self.snapshot.clone());
        }
    }
}

struct OutboxState<T> {
    /// Highest sequence number accepted so far.
    accepted: u64,
    next: Option<Pending<T>>,
    draining: bool,
}

/// Per-channel delivery queue.
///
/// Snapshots leave in sequence order and a listener is never called by two
/// threads at once. A writer that finds the outbox draining hands its snapshot
/// to the draining thread and returns; a snapshot that is overtaken before it
/// goes out is replaced by the newer one. No lock is held while a listener
/// runs, so listeners may read and even mutate the store.
pub(crate) struct Outbox<T> {
    state: Mutex<OutboxState<T>>,
}

impl<T> Default for Outbox<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(OutboxState {
                accepted: 0,
                next: None,
                draining: false,
            }),
        }
    }
}

impl<T: Clone> Outbox<T> {
    pub(crate) fn submit(&self, pending: Option<Pending<T>>) {
        let Some(pending) = pending else {
            return;
        };

        {
            let mut state = lock(&self.state);
            if pending.seq <= state.accepted {
                trace!(seq = pending.seq, accepted = state.accepted, "Stale snapshot discarded");
                return;
            }
            state.accepted = pending.seq;
            state.next = Some(pending);
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let guard = Draining(&self.state);
        loop {
            let next = {
                let mut state = lock(&self.state);
                match state.next.take() {
                    Some(next) => next,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };
            next.deliver();
        }
        std::mem::forget(guard);
    }

    #[cfg(test)]
    pub(crate) fn is_draining(&self) -> bool {
        lock(&self.state).draining
    }
}

/// Reopens the outbox if a listener panics mid-delivery.
struct Draining<'a, T>(&'a Mutex<OutboxState<T>>);

impl<T> Drop for Draining<'_, T> {
    fn drop(&mut self) {
        let mut state = lock(self.0);
        state.draining = false;
        state.next = None;
    }
}

/// Handle that deregisters exactly one listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "the listener stays registered until `unsubscribe` is called"]
#[derive(Debug)]
pub struct Subscription {
    store: Weak<Shared>,
    channel: Channel,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(store: Weak<Shared>, channel: Channel, id: u64) -> Self {
        Self { store, channel, id }
    }

    /// Remove the listener. Returns false if it was already gone or the
    /// store has been dropped.
    pub fn unsubscribe(self) -> bool {
        match self.store.upgrade() {
            Some(shared) => shared.remove_listener(self.channel, self.id),
            None => false,
        }
    }
}

struct FeedQueue<T> {
    snapshots: VecDeque<Vec<T>>,
    closed: bool,
}

struct FeedShared<T> {
    capacity: usize,
    queue: Mutex<FeedQueue<T>>,
    notify: Notify,
}

impl<T> FeedShared<T> {
    fn push(&self, snapshot: Vec<T>) {
        {
            let mut queue = lock(&self.queue);
            if queue.snapshots.len() >= self.capacity {
                queue.snapshots.pop_front();
                trace!("Feed full, oldest snapshot dropped");
            }
            queue.snapshots.push_back(snapshot);
        }
        self.notify.notify_one();
    }
}

/// Owned by the registered listener; closes the feed once the store lets go
/// of it.
struct FeedSender<T>(Arc<FeedShared<T>>);

impl<T> Drop for FeedSender<T> {
    fn drop(&mut self) {
        lock(&self.0.queue).closed = true;
        self.0.notify.notify_one();
    }
}

/// Bounded queue of snapshots for consumers that must not block the store.
///
/// The first snapshot is the state at registration. When the queue is full
/// the oldest queued snapshot is dropped, so the newest state always gets
/// through. Dropping the feed unsubscribes.
pub struct Feed<T> {
    shared: Arc<FeedShared<T>>,
    subscription: Option<Subscription>,
}

impl<T: Send + 'static> Feed<T> {
    /// A feed primed with `initial`, plus the listener that fills it.
    pub(crate) fn primed(capacity: usize, initial: Vec<T>) -> (Self, Listener<T>) {
        let shared = Arc::new(FeedShared {
            capacity: capacity.max(1),
            queue: Mutex::new(FeedQueue {
                snapshots: VecDeque::from([initial]),
                closed: false,
            }),
            notify: Notify::new(),
        });

        let sender = FeedSender(Arc::clone(&shared));
        let listener: Listener<T> = Arc::new(move |snapshot| sender.0.push(snapshot));
        let feed = Self {
            shared,
            subscription: None,
        };
        (feed, listener)
    }

    pub(crate) fn attach(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }
}

impl<T> Feed<T> {
    /// Wait for the next snapshot. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Vec<T>> {
        loop {
            {
                let mut queue = lock(&self.shared.queue);
                if let Some(snapshot) = queue.snapshots.pop_front() {
                    return Some(snapshot);
                }
                if queue.closed {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take a snapshot if one is already queued.
    pub fn try_recv(&mut self) -> Option<Vec<T>> {
        lock(&self.shared.queue).snapshots.pop_front()
    }
}

impl<T> Drop for Feed<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(order: &Arc<Mutex<Vec<(&'static str, usize)>>>, tag: &'static str) -> Listener<u32> {
        let order = Arc::clone(order);
        Arc::new(move |snapshot: Vec<u32>| {
            order.lock().unwrap().push((tag, snapshot.len()));
        })
    }

    #[test]
    fn test_remove_by_id_keeps_others() {
        let mut listeners: Listeners<u32> = Listeners::default();
        let a = listeners.add(Arc::new(|_| {}));
        let b = listeners.add(Arc::new(|_| {}));
        let c = listeners.add(Arc::new(|_| {}));

        assert!(listeners.remove(b));
        assert!(!listeners.remove(b));
        assert_eq!(listeners.len(), 2);

        let ids: Vec<u64> = listeners.entries.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn test_pending_delivers_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut listeners: Listeners<u32> = Listeners::default();
        listeners.add(recording(&order, "first"));
        listeners.add(recording(&order, "second"));

        Pending::capture(&mut listeners, || vec![1, 2, 3]).unwrap().deliver();

        assert_eq!(*order.lock().unwrap(), vec![("first", 3), ("second", 3)]);
    }

    #[test]
    fn test_capture_skips_snapshot_without_listeners() {
        let mut listeners: Listeners<u32> = Listeners::default();
        let pending = Pending::capture(&mut listeners, || panic!("snapshot should not be built"));
        assert!(pending.is_none());
        assert_eq!(listeners.seq, 0);
    }

    #[test]
    fn test_outbox_discards_overtaken_snapshot() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut listeners: Listeners<u32> = Listeners::default();
        listeners.add(recording(&order, "only"));

        let older = Pending::capture(&mut listeners, || vec![1]);
        let newer = Pending::capture(&mut listeners, || vec![1, 2]);

        let outbox = Outbox::default();
        outbox.submit(newer);
        outbox.submit(older);

        assert_eq!(*order.lock().unwrap(), vec![("only", 2)]);
    }

    #[test]
    fn test_outbox_reopens_after_listener_panic() {
        let mut listeners: Listeners<u32> = Listeners::default();
        listeners.add(Arc::new(|snapshot: Vec<u32>| {
            if snapshot.len() == 1 {
                panic!("listener failure");
            }
        }));

        let outbox = Outbox::default();
        let first = Pending::capture(&mut listeners, || vec![1]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| outbox.submit(first)));
        assert!(result.is_err());
        assert!(!outbox.is_draining());

        let order = Arc::new(Mutex::new(Vec::new()));
        listeners.add(recording(&order, "later"));
        outbox.submit(Pending::capture(&mut listeners, || vec![1, 2]));
        assert_eq!(*order.lock().unwrap(), vec![("later", 2)]);
    }

    #[test]
    fn test_full_feed_keeps_newest() {
        let (mut feed, listener) = Feed::primed(2, vec![0u32]);
        listener(vec![0, 1]);
        listener(vec![0, 1, 2]);

        assert_eq!(feed.try_recv().unwrap().len(), 2);
        assert_eq!(feed.try_recv().unwrap().len(), 3);
        assert!(feed.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_feed_closes_when_listener_dropped() {
        let (mut feed, listener) = Feed::primed(4, Vec::<u32>::new());
        listener(vec![7]);
        drop(listener);

        assert_eq!(feed.recv().await, Some(vec![]));
        assert_eq!(feed.recv().await, Some(vec![7]));
        assert_eq!(feed.recv().await, None);
    }
}
