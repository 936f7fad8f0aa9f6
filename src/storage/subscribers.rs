//! In-process listener registry shared by the store backends.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use crate::storage::{CollectionPath, Listener, Snapshot, StoreError, Subscription};

struct Entry {
    listener: Listener,
    /// Version of the last snapshot handed to the listener, `None` before the
    /// first delivery. Held for the whole listener call so deliveries from
    /// different threads are serialised.
    delivered: Mutex<Option<u64>>,
}

impl Entry {
    fn deliver(&self, snapshot: &Snapshot) {
        let mut delivered = self
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(latest) = *delivered {
            if latest >= snapshot.version {
                tracing::trace!(
                    version = snapshot.version,
                    latest,
                    "discarding stale snapshot"
                );
                return;
            }
        }
        *delivered = Some(snapshot.version);
        (self.listener)(snapshot);
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<CollectionPath, Vec<(u64, Arc<Entry>)>>,
}

/// A set of snapshot listeners keyed by collection.
#[derive(Default, Clone)]
pub struct Subscribers {
    registry: Arc<Mutex<Registry>>,
}

/// Listeners collected for one notification, delivered after the store lock
/// is released.
#[must_use]
pub struct Pending {
    entries: Vec<Arc<Entry>>,
    snapshot: Snapshot,
}

impl Pending {
    /// Invoke every collected listener with the snapshot.
    pub fn deliver(self) {
        tracing::debug!(
            version = self.snapshot.version,
            listeners = self.entries.len(),
            documents = self.snapshot.len(),
            "delivering snapshot"
        );
        for entry in &self.entries {
            entry.deliver(&self.snapshot);
        }
    }
}

impl Subscribers {
    /// Register a listener and return the pending initial delivery together
    /// with the subscription handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the registry lock is poisoned.
    pub fn register(
        &self,
        collection: &CollectionPath,
        listener: Listener,
        initial: Snapshot,
    ) -> Result<(Pending, Subscription), StoreError> {
        let entry = Arc::new(Entry {
            listener,
            delivered: Mutex::new(None),
        });

        let id = {
            let mut registry = self
                .registry
                .lock()
                .map_err(|_| StoreError::Poisoned("subscribe"))?;
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .listeners
                .entry(collection.clone())
                .or_default()
                .push((id, Arc::clone(&entry)));
            id
        };

        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        let key = collection.clone();
        let subscription = Subscription::new(move || {
            let Some(registry) = weak.upgrade() else {
                return;
            };
            let Ok(mut registry) = registry.lock() else {
                return;
            };
            if let Some(listeners) = registry.listeners.get_mut(&key) {
                listeners.retain(|(existing, _)| *existing != id);
                if listeners.is_empty() {
                    registry.listeners.remove(&key);
                }
            }
            tracing::debug!(collection = %key, "subscription cancelled");
        });

        let pending = Pending {
            entries: vec![entry],
            snapshot: initial,
        };
        Ok((pending, subscription))
    }

    /// Whether any listener is registered for `collection`.
    pub fn is_watched(&self, collection: &CollectionPath) -> bool {
        self.registry
            .lock()
            .is_ok_and(|registry| registry.listeners.contains_key(collection))
    }

    /// Number of listeners registered for `collection`.
    pub fn count(&self, collection: &CollectionPath) -> usize {
        self.registry.lock().map_or(0, |registry| {
            registry.listeners.get(collection).map_or(0, Vec::len)
        })
    }

    /// Collect the listeners of `collection` for delivery of `snapshot`.
    pub fn notify(&self, collection: &CollectionPath, snapshot: Snapshot) -> Pending {
        let entries = self
            .registry
            .lock()
            .map(|registry| {
                registry
                    .listeners
                    .get(collection)
                    .map(|listeners| listeners.iter().map(|(_, e)| Arc::clone(e)).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        Pending { entries, snapshot }
    }
}
