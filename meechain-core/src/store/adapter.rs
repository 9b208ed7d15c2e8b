// src/store/adapter.rs
//! Persistence adapter: one front door over a primary store and a fallback.
//!
//! Every operation first goes to the primary backend. A backend failure
//! (unavailable, permission, conflict) is logged and the same operation is
//! replayed against the in-memory fallback. The `(collection, owner)` scope
//! then stays on the fallback so later reads see what was written there.
//! Listeners are fed from whichever backend currently serves their scope.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

use super::listeners::{ListenerRegistry, SnapshotFn, Subscription};
use super::{Collection, Document, DocumentStore, Entity, MemoryStore, StoreError};

pub struct Persistence {
    primary: Option<Arc<dyn DocumentStore>>,
    fallback: Arc<MemoryStore>,
    fallback_enabled: bool,
    degraded: Mutex<HashSet<(Collection, String)>>,
    listeners: Arc<ListenerRegistry>,
    gate: EmitGate,
}

type ScopeKey = (Collection, String);

fn scope_key(collection: Collection, owner: &str) -> ScopeKey {
    (collection, collection.scope(owner).to_string())
}

#[derive(Default)]
struct EmitState {
    emitter: Option<ThreadId>,
    pending: bool,
}

/// Serializes snapshot delivery per scope. One thread at a time lists and
/// notifies; writes that land meanwhile only mark the scope pending and the
/// emitting thread lists again before it lets go.
#[derive(Default)]
struct EmitGate {
    scopes: Mutex<HashMap<ScopeKey, EmitState>>,
    idle: Condvar,
}

impl EmitGate {
    /// Record a change. Returns a turn when the caller has to deliver it.
    fn announce(&self, key: ScopeKey) -> Option<EmitTurn<'_>> {
        let mut scopes = self.scopes.lock().ok()?;
        let state = scopes.entry(key.clone()).or_default();
        state.pending = true;
        if state.emitter.is_some() {
            return None;
        }
        state.emitter = Some(thread::current().id());
        Some(EmitTurn { gate: self, key, done: false })
    }

    /// Wait for the scope to go quiet and take it. `None` when this thread
    /// is already the emitter (a listener subscribing from a callback).
    fn acquire(&self, key: ScopeKey) -> Option<EmitTurn<'_>> {
        let me = thread::current().id();
        let mut scopes = self.scopes.lock().ok()?;
        loop {
            let state = scopes.entry(key.clone()).or_default();
            let emitter = state.emitter;
            match emitter {
                None => {
                    state.emitter = Some(me);
                    return Some(EmitTurn { gate: self, key, done: false });
                }
                Some(owner) if owner == me => return None,
                Some(_) => scopes = self.idle.wait(scopes).ok()?,
            }
        }
    }
}

struct EmitTurn<'a> {
    gate: &'a EmitGate,
    key: ScopeKey,
    done: bool,
}

impl EmitTurn<'_> {
    /// Claim the pending change, or end the turn when there is none. Both
    /// happen under one lock so no announcement slips between them.
    fn take_pending(&mut self) -> bool {
        let Ok(mut scopes) = self.gate.scopes.lock() else {
            self.done = true;
            return false;
        };
        if let Some(state) = scopes.get_mut(&self.key) {
            if state.pending {
                state.pending = false;
                return true;
            }
        }
        scopes.remove(&self.key);
        self.done = true;
        self.gate.idle.notify_all();
        false
    }
}

impl Drop for EmitTurn<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // a callback panicked mid-delivery; hand the scope back
        if let Ok(mut scopes) = self.gate.scopes.lock() {
            if let Some(state) = scopes.get_mut(&self.key) {
                state.emitter = None;
            }
        }
        self.gate.idle.notify_all();
    }
}

impl Persistence {
    pub fn new(primary: Arc<dyn DocumentStore>, fallback: Arc<MemoryStore>) -> Self {
        Self {
            primary: Some(primary),
            fallback,
            fallback_enabled: true,
            degraded: Mutex::new(HashSet::new()),
            listeners: ListenerRegistry::new(),
            gate: EmitGate::default(),
        }
    }

    /// Serve everything from the in-memory store.
    pub fn memory_only(store: Arc<MemoryStore>) -> Self {
        Self {
            primary: None,
            fallback: store,
            fallback_enabled: true,
            degraded: Mutex::new(HashSet::new()),
            listeners: ListenerRegistry::new(),
            gate: EmitGate::default(),
        }
    }

    /// Surface primary failures instead of falling back.
    pub fn without_fallback(mut self) -> Self {
        self.fallback_enabled = false;
        self
    }

    pub fn fallback(&self) -> &Arc<MemoryStore> {
        &self.fallback
    }

    /// True once any operation on this scope has been served by the fallback.
    pub fn is_degraded(&self, collection: Collection, owner: &str) -> bool {
        let key = (collection, collection.scope(owner).to_string());
        self.degraded
            .lock()
            .map(|set| set.contains(&key))
            .unwrap_or(true)
    }

    fn mark_degraded(&self, collection: Collection, owner: &str) {
        if let Ok(mut set) = self.degraded.lock() {
            set.insert((collection, collection.scope(owner).to_string()));
        }
    }

    fn run<R>(
        &self,
        collection: Collection,
        owner: &str,
        op_name: &'static str,
        mut op: impl FnMut(&dyn DocumentStore) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        if let Some(primary) = &self.primary {
            if !self.is_degraded(collection, owner) {
                match op(primary.as_ref()) {
                    Ok(out) => return Ok(out),
                    Err(err) if err.is_backend_failure() && self.fallback_enabled => {
                        warn!(
                            collection = collection.name(),
                            owner = collection.scope(owner),
                            op = op_name,
                            backend = primary.name(),
                            error = %err,
                            "primary store failed; falling back to in-memory store"
                        );
                        self.mark_degraded(collection, owner);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        op(self.fallback.as_ref())
    }

    fn emit(&self, collection: Collection, owner: &str) {
        if self.listeners.listener_count(collection, owner) == 0 {
            return;
        }
        if let Some(mut turn) = self.gate.announce(scope_key(collection, owner)) {
            self.drain(collection, owner, &mut turn);
        }
    }

    /// Deliver fresh snapshots until no change is pending. Each one is
    /// listed after the previous delivery, so listeners never go backwards.
    fn drain(&self, collection: Collection, owner: &str, turn: &mut EmitTurn<'_>) {
        while turn.take_pending() {
            match self.run(collection, owner, "list", |s| s.list(collection, owner)) {
                Ok(docs) => self.listeners.notify(collection, owner, &docs),
                Err(err) => warn!(collection = collection.name(), error = %err, "snapshot for listeners failed"),
            }
        }
    }

    // ---------- raw documents ----------

    pub fn list_raw(&self, collection: Collection, owner: &str) -> Result<Vec<Document>, StoreError> {
        self.run(collection, owner, "list", |s| s.list(collection, owner))
    }

    pub fn is_empty(&self, collection: Collection, owner: &str) -> Result<bool, StoreError> {
        self.run(collection, owner, "is_empty", |s| s.is_empty(collection, owner))
    }

    /// Subscribe to raw snapshots. The current snapshot is delivered before
    /// this returns.
    pub fn listen_raw(
        &self,
        collection: Collection,
        owner: &str,
        callback: SnapshotFn,
    ) -> Result<Subscription, StoreError> {
        let mut turn = self.gate.acquire(scope_key(collection, owner));
        let sub = self.listeners.subscribe(collection, owner, callback.clone());
        let initial = self.list_raw(collection, owner);
        if let Ok(docs) = &initial {
            callback(docs);
        }
        // flush writes that arrived while the scope was held
        if let Some(turn) = turn.as_mut() {
            self.drain(collection, owner, turn);
        }
        initial.map(|_| sub)
    }

    pub fn write_raw(&self, collection: Collection, owner: &str, data: Value) -> Result<Document, StoreError> {
        let doc = self.run(collection, owner, "write", |s| s.insert(collection, owner, data.clone()))?;
        debug!(collection = collection.name(), id = %doc.id, "document written");
        self.emit(collection, owner);
        Ok(doc)
    }

    pub fn put_raw(&self, collection: Collection, owner: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        let doc = self.run(collection, owner, "put", |s| s.put(collection, owner, id, data.clone()))?;
        self.emit(collection, owner);
        Ok(doc)
    }

    // ---------- typed records ----------

    /// Persist a new record; the returned copy carries the generated id.
    pub fn write<T: Entity>(&self, owner: &str, record: &T) -> Result<T, StoreError> {
        let doc = self.write_raw(T::COLLECTION, owner, serde_json::to_value(record)?)?;
        Ok(serde_json::from_value(doc.data)?)
    }

    /// Persist a record under its own id, replacing any previous version.
    pub fn put<T: Entity>(&self, owner: &str, record: &T) -> Result<T, StoreError> {
        let doc = self.put_raw(T::COLLECTION, owner, record.id(), serde_json::to_value(record)?)?;
        Ok(serde_json::from_value(doc.data)?)
    }

    pub fn get<T: Entity>(&self, owner: &str, id: &str) -> Result<Option<T>, StoreError> {
        let doc = self.run(T::COLLECTION, owner, "get", |s| s.get(T::COLLECTION, owner, id))?;
        doc.map(|d| serde_json::from_value(d.data)).transpose().map_err(Into::into)
    }

    /// All records in canonical order. Documents that no longer decode are
    /// skipped with a warning.
    pub fn list<T: Entity>(&self, owner: &str) -> Result<Vec<T>, StoreError> {
        Ok(decode_all(T::COLLECTION, self.list_raw(T::COLLECTION, owner)?))
    }

    /// Serializable read-modify-write. `update` sees the current record (or
    /// `None`) and returns the replacement, or `None` to leave it untouched.
    /// It may run more than once if the backend retries.
    pub fn transactional_update<T: Entity>(
        &self,
        owner: &str,
        id: &str,
        mut update: impl FnMut(Option<T>) -> Option<T>,
    ) -> Result<Option<T>, StoreError> {
        let collection = T::COLLECTION;
        let written = self.run(collection, owner, "transact", |s| {
            s.transact(collection, owner, id, &mut |current: Option<Value>| -> Result<Option<Value>, StoreError> {
                let typed = current.map(serde_json::from_value::<T>).transpose()?;
                match update(typed) {
                    Some(next) => Ok(Some(serde_json::to_value(&next)?)),
                    None => Ok(None),
                }
            })
        })?;
        let Some(doc) = written else {
            return Ok(None);
        };
        self.emit(collection, owner);
        Ok(Some(serde_json::from_value(doc.data)?))
    }

    /// Typed listener; see [`Persistence::listen_raw`].
    pub fn listen<T, F>(&self, owner: &str, callback: F) -> Result<Subscription, StoreError>
    where
        T: Entity,
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        let collection = T::COLLECTION;
        self.listen_raw(
            collection,
            owner,
            Arc::new(move |docs: &[Document]| callback(decode_all(collection, docs.to_vec()))),
        )
    }
}

fn decode_all<T: Entity>(collection: Collection, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<T>(doc.data) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(collection = collection.name(), id = %doc.id, error = %err, "skipping undecodable document");
                None
            }
        })
        .collect()
}
