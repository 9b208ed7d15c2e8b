// src/store/listeners.rs
//! Observer registry for collection snapshots.
//!
//! Listeners are keyed by `(collection, owner)`. Each one gets a
//! [`Subscription`] handle; dropping the handle or calling
//! [`Subscription::unsubscribe`] removes the listener before the next emit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Weak};

use super::{Collection, Document};

pub type SnapshotFn = Arc<dyn Fn(&[Document]) + Send + Sync>;

type Key = (Collection, String);

#[derive(Default)]
struct Inner {
    next_id: u64,
    slots: HashMap<Key, BTreeMap<u64, SnapshotFn>>,
}

#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<Inner>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, collection: Collection, owner: &str, callback: SnapshotFn) -> Subscription {
        let key = (collection, collection.scope(owner).to_string());
        let id = match self.inner.lock() {
            Ok(mut inner) => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.slots.entry(key.clone()).or_default().insert(id, callback);
                id
            }
            Err(_) => {
                tracing::error!(collection = collection.name(), "listener registry poisoned; subscription inert");
                0
            }
        };
        Subscription {
            registry: Arc::downgrade(self),
            key,
            id,
        }
    }

    /// Deliver `docs` to every listener on the scope, in subscription order.
    /// Callbacks run after the registry lock is released.
    pub fn notify(&self, collection: Collection, owner: &str, docs: &[Document]) {
        let callbacks: Vec<SnapshotFn> = match self.inner.lock() {
            Ok(inner) => inner
                .slots
                .get(&(collection, collection.scope(owner).to_string()))
                .map(|slot| slot.values().cloned().collect())
                .unwrap_or_default(),
            Err(_) => return,
        };
        for cb in callbacks {
            cb(docs);
        }
    }

    pub fn listener_count(&self, collection: Collection, owner: &str) -> usize {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| {
                inner
                    .slots
                    .get(&(collection, collection.scope(owner).to_string()))
                    .map(BTreeMap::len)
            })
            .unwrap_or(0)
    }

    fn remove(&self, key: &Key, id: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(slot) = inner.slots.get_mut(key) {
                slot.remove(&id);
                if slot.is_empty() {
                    inner.slots.remove(key);
                }
            }
        }
    }
}

/// Handle for one registered listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    key: Key,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    pub fn collection(&self) -> Collection {
        self.key.0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.key, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.key.0)
            .field("owner", &self.key.1)
            .field("id", &self.id)
            .finish()
    }
}
