// src/store/memory.rs
//! In-process document store.
//!
//! Serves as the fallback behind [`super::Persistence`] and as the primary in
//! tests. Ids follow the short `nft7` / `t12` style of the fixture data.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Collection, Document, DocumentStore, StoreError, UpdateFn, canonical_sort, sort_key, with_id};

#[derive(Default)]
struct Inner {
    seq: u64,
    counters: HashMap<Collection, u64>,
    rows: HashMap<(Collection, String), Vec<Document>>,
}

impl Inner {
    fn scope(&mut self, collection: Collection, owner: &str) -> &mut Vec<Document> {
        self.rows
            .entry((collection, collection.scope(owner).to_string()))
            .or_default()
    }

    fn next_id(&mut self, collection: Collection, owner: &str) -> String {
        loop {
            let n = {
                let c = self.counters.entry(collection).or_insert(0);
                *c += 1;
                *c
            };
            let candidate = format!("{}{}", collection.id_prefix(), n);
            if !self.scope(collection, owner).iter().any(|d| d.id == candidate) {
                return candidate;
            }
        }
    }

    fn upsert(&mut self, collection: Collection, owner: &str, id: &str, data: Value) -> Document {
        let data = with_id(data, id);
        let now_ms = Utc::now().timestamp_millis();
        self.seq += 1;
        let fresh_seq = self.seq;
        let rows = self.scope(collection, owner);
        match rows.iter_mut().find(|d| d.id == id) {
            Some(existing) => {
                existing.sort_ms = sort_key(collection, &data, existing.sort_ms);
                existing.data = data;
                existing.clone()
            }
            None => {
                let doc = Document {
                    id: id.to_string(),
                    seq: fresh_seq,
                    sort_ms: sort_key(collection, &data, now_ms),
                    data,
                };
                rows.push(doc.clone());
                doc
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with the demo dataset for `owner`.
    pub fn seeded(owner: &str) -> Result<Self, StoreError> {
        let store = Self::new();
        super::fixtures::seed(&store, owner)?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn list(&self, collection: Collection, owner: &str) -> Result<Vec<Document>, StoreError> {
        let mut inner = self.lock()?;
        let mut docs = inner.scope(collection, owner).clone();
        canonical_sort(collection, &mut docs);
        Ok(docs)
    }

    fn get(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner
            .scope(collection, owner)
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    fn insert(
        &self,
        collection: Collection,
        owner: &str,
        data: Value,
    ) -> Result<Document, StoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_id(collection, owner);
        Ok(inner.upsert(collection, owner, &id, data))
    }

    fn put(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.upsert(collection, owner, id, data))
    }

    fn transact(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
        update: &mut UpdateFn<'_>,
    ) -> Result<Option<Document>, StoreError> {
        // The whole read-modify-write runs under the store lock.
        let mut inner = self.lock()?;
        let current = inner
            .scope(collection, owner)
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.data.clone());
        match update(current)? {
            Some(next) => Ok(Some(inner.upsert(collection, owner, id, next))),
            None => Ok(None),
        }
    }
}
