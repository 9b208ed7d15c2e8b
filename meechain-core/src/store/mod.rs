// src/store/mod.rs
//! Document storage for contributor state.
//!
//! Records live as JSON documents in named collections, scoped per owner key.
//! Two backends implement [`DocumentStore`]: the durable [`SqliteStore`] and the
//! in-process [`MemoryStore`]. [`Persistence`] sits in front of both and
//! serves from the memory store whenever the primary fails.

pub mod adapter;
pub mod fixtures;
pub mod listeners;
pub mod memory;
pub mod sqlite;

use chrono::DateTime;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use adapter::Persistence;
pub use listeners::{ListenerRegistry, Subscription};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Owner key used for collections shared by every contributor.
pub const SHARED_OWNER: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Nfts,
    Badges,
    Proposals,
    Timeline,
    Designs,
    Profile,
    VoiceLogs,
}

/// How a collection is presented to readers and listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Highest sort key first; later inserts win ties.
    NewestFirst,
    /// Insertion order.
    Insertion,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Nfts,
        Collection::Badges,
        Collection::Proposals,
        Collection::Timeline,
        Collection::Designs,
        Collection::Profile,
        Collection::VoiceLogs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Nfts => "nfts",
            Collection::Badges => "badges",
            Collection::Proposals => "proposals",
            Collection::Timeline => "timeline",
            Collection::Designs => "designs",
            Collection::Profile => "profile",
            Collection::VoiceLogs => "voicelogs",
        }
    }

    pub fn parse(name: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Proposals are global; everything else belongs to one contributor.
    pub fn is_shared(&self) -> bool {
        matches!(self, Collection::Proposals)
    }

    /// Resolve the owner key a document is actually stored under.
    pub fn scope<'a>(&self, owner: &'a str) -> &'a str {
        if self.is_shared() { SHARED_OWNER } else { owner }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            Collection::Nfts => "nft",
            Collection::Badges => "badge",
            Collection::Proposals => "prop",
            Collection::Timeline => "t",
            Collection::Designs => "d",
            Collection::Profile => "profile",
            Collection::VoiceLogs => "vl",
        }
    }

    /// Document field holding an RFC 3339 time that drives ordering.
    /// Collections without one are ordered by creation time.
    pub fn sort_field(&self) -> Option<&'static str> {
        match self {
            Collection::Timeline | Collection::VoiceLogs => Some("timestamp"),
            _ => None,
        }
    }

    pub fn ordering(&self) -> Ordering {
        match self {
            Collection::Proposals => Ordering::Insertion,
            _ => Ordering::NewestFirst,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored record. `data` always carries the document id under `"id"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Monotonic insertion counter within a backend.
    pub seq: u64,
    /// Milliseconds since epoch used for ordering.
    pub sort_ms: i64,
    pub data: Value,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transaction conflict on {collection}/{id} after {attempts} attempts")]
    Conflict {
        collection: &'static str,
        id: String,
        attempts: u32,
    },
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Failures that say something about the backend rather than the record.
    pub fn is_backend_failure(&self) -> bool {
        !matches!(self, StoreError::Codec(_))
    }
}

/// Read-modify-write callback for [`DocumentStore::transact`].
///
/// Receives the current document (if any). Returning `Ok(None)` leaves the
/// store untouched. Backends may call it more than once when they retry.
pub type UpdateFn<'a> = dyn FnMut(Option<Value>) -> Result<Option<Value>, StoreError> + 'a;

pub trait DocumentStore: Send + Sync {
    /// Short backend label for logs.
    fn name(&self) -> &'static str;

    /// All documents of a collection for an owner, in canonical order.
    fn list(&self, collection: Collection, owner: &str) -> Result<Vec<Document>, StoreError>;

    fn get(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Insert a new document under a freshly generated id.
    fn insert(
        &self,
        collection: Collection,
        owner: &str,
        data: Value,
    ) -> Result<Document, StoreError>;

    /// Insert or replace a document under an explicit id.
    fn put(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, StoreError>;

    /// Serializable read-modify-write of one document.
    fn transact(
        &self,
        collection: Collection,
        owner: &str,
        id: &str,
        update: &mut UpdateFn<'_>,
    ) -> Result<Option<Document>, StoreError>;

    fn is_empty(&self, collection: Collection, owner: &str) -> Result<bool, StoreError> {
        Ok(self.list(collection, owner)?.is_empty())
    }
}

/// Typed record stored in a fixed collection.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;
    fn id(&self) -> &str;
}

/// Ordering key for a document: its timestamp field when the collection has
/// one and it parses, otherwise the supplied creation time.
pub(crate) fn sort_key(collection: Collection, data: &Value, created_ms: i64) -> i64 {
    collection
        .sort_field()
        .and_then(|field| data.get(field))
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.timestamp_millis())
        .unwrap_or(created_ms)
}

/// Stamp the id into the payload so readers always see it.
pub(crate) fn with_id(mut data: Value, id: &str) -> Value {
    if let Value::Object(map) = &mut data {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    data
}

pub(crate) fn canonical_sort(collection: Collection, docs: &mut [Document]) {
    match collection.ordering() {
        Ordering::Insertion => docs.sort_by_key(|d| d.seq),
        Ordering::NewestFirst => docs.sort_by(|a, b| {
            b.sort_ms
                .cmp(&a.sort_ms)
                .then_with(|| b.seq.cmp(&a.seq))
        }),
    }
}
