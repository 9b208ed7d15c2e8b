// src/services/timeline.rs
use chrono::Utc;
use std::sync::Arc;

use crate::models::{NewTimelineEvent, TimelineEvent};
use crate::store::{Persistence, StoreError, Subscription};

/// Append-only contributor history. Readers get it newest first.
#[derive(Clone)]
pub struct EventLog {
    store: Arc<Persistence>,
}

impl EventLog {
    pub fn new(store: Arc<Persistence>) -> Self {
        Self { store }
    }

    /// Stamp the event with the current time and persist it.
    pub fn append(&self, owner: &str, event: NewTimelineEvent) -> Result<TimelineEvent, StoreError> {
        let stored = self.store.write(owner, &event.stamp(Utc::now()))?;
        tracing::debug!(owner, id = %stored.id, kind = ?stored.kind, "timeline event appended");
        Ok(stored)
    }

    pub fn recent(&self, owner: &str, limit: Option<usize>) -> Result<Vec<TimelineEvent>, StoreError> {
        let mut events = self.store.list::<TimelineEvent>(owner)?;
        if let Some(n) = limit {
            events.truncate(n);
        }
        Ok(events)
    }

    pub fn listen<F>(&self, owner: &str, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(Vec<TimelineEvent>) + Send + Sync + 'static,
    {
        self.store.listen::<TimelineEvent, _>(owner, callback)
    }
}
