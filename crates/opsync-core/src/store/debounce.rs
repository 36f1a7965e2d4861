use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A keyed map whose updates are broadcast to subscribers at most once per
/// quiescence window.
///
/// Every `upsert` (re)starts the window; when it elapses with no further
/// writes, the full materialized value list is delivered to all current
/// subscribers in one message. Rapid bursts coalesce into a single delivery,
/// which keeps a chatty push stream from churning downstream consumers.
///
/// Handles are cheap clones sharing one map. Must be used from within a
/// tokio runtime (the window timer is a spawned task).
pub struct DebouncedBroadcast<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    window: Duration,
}

struct Inner<K, V> {
    map: HashMap<K, V>,
    /// Bumped on every upsert; a pending timer only fires if the epoch it
    /// captured is still current.
    epoch: u64,
    subscribers: Vec<mpsc::UnboundedSender<Vec<V>>>,
}

impl<K, V> DebouncedBroadcast<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                map: HashMap::new(),
                epoch: 0,
                subscribers: Vec::new(),
            })),
            window,
        }
    }

    /// Insert or overwrite the value for `key` (last write wins) and restart
    /// the quiescence window.
    pub fn upsert(&self, key: K, value: V) {
        let scheduled = {
            let mut inner = self.inner.lock();
            inner.map.insert(key, value);
            inner.epoch += 1;
            inner.epoch
        };

        let inner = Arc::clone(&self.inner);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut inner = inner.lock();
            if inner.epoch != scheduled {
                // A later upsert restarted the window; its timer will emit.
                return;
            }
            let snapshot: Vec<V> = inner.map.values().cloned().collect();
            inner
                .subscribers
                .retain(|tx| tx.send(snapshot.clone()).is_ok());
        });
    }

    /// Subscribe to debounced snapshots. A new subscriber immediately
    /// receives the current snapshot if the map is non-empty. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Vec<V>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if !inner.map.is_empty() {
            let snapshot: Vec<V> = inner.map.values().cloned().collect();
            let _ = tx.send(snapshot);
        }
        inner.subscribers.push(tx);
        rx
    }

    /// The current materialized value list, bypassing the debounce.
    pub fn values(&self) -> Vec<V> {
        self.inner.lock().map.values().cloned().collect()
    }
}

impl<K, V> Clone for DebouncedBroadcast<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            window: self.window,
        }
    }
}
