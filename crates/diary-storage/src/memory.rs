//! In-memory event store
//!
//! Suitable for testing and for hosts that do not need durability.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use diary_core::{
    Change, ChangeKind, Event, EventFilter, EventId, EventStore, PageWindow, StorageError,
    WriteInterceptor, newest_first,
};
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::commit::{check_revision, seal};

/// In-memory implementation of [`EventStore`]
///
/// Commits and removals hold the commit lock exclusively while they check,
/// stamp and apply a batch. Reads hold it shared, so a reader never sees
/// part of a batch.
#[derive(Debug)]
pub struct InMemoryEventStore {
    /// Stored events keyed by id
    events: DashMap<EventId, Event>,
    /// Exclusive for the whole check/stamp/apply sequence of a write,
    /// shared for reads
    commit_lock: RwLock<()>,
    /// Next id to hand out; ids are never reused
    next_id: AtomicU64,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            commit_lock: RwLock::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        let _guard = self.commit_lock.read();
        self.events.len()
    }

    /// Check if the store holds no events
    pub fn is_empty(&self) -> bool {
        let _guard = self.commit_lock.read();
        self.events.is_empty()
    }

    fn allocate_id(&self) -> EventId {
        EventId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        let _guard = self.commit_lock.read();
        Ok(self.events.get(&id).map(|entry| entry.value().clone()))
    }

    async fn exists(&self, id: EventId) -> Result<bool, StorageError> {
        let _guard = self.commit_lock.read();
        Ok(self.events.contains_key(&id))
    }

    async fn commit(
        &self,
        mut changes: Vec<Change<Event>>,
        interceptor: &dyn WriteInterceptor<Event>,
    ) -> Result<Vec<Event>, StorageError> {
        let _guard = self.commit_lock.write();

        for change in &changes {
            if let ChangeKind::Modified { expected } = change.kind {
                let id = change.record.id;
                let actual = self.events.get(&id).map(|entry| entry.revision);
                check_revision(id, expected, actual)?;
            }
        }

        interceptor.before_commit(&mut changes);

        let sealed = seal(changes, || self.allocate_id());
        for event in &sealed {
            trace!(id = %event.id, revision = %event.revision, "Writing event");
            self.events.insert(event.id, event.clone());
        }

        debug!(count = sealed.len(), "Committed changes");
        Ok(sealed)
    }

    async fn remove(&self, id: EventId) -> Result<bool, StorageError> {
        let _guard = self.commit_lock.write();
        let removed = self.events.remove(&id).is_some();
        trace!(id = %id, removed, "Removed event");
        Ok(removed)
    }

    async fn query(
        &self,
        filter: &EventFilter,
        window: PageWindow,
    ) -> Result<Vec<Event>, StorageError> {
        let _guard = self.commit_lock.read();
        let mut matching: Vec<Event> = self
            .events
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(newest_first);

        Ok(matching
            .into_iter()
            .skip(window.offset)
            .take(window.limit)
            .collect())
    }

    async fn count(&self, filter: &EventFilter) -> Result<usize, StorageError> {
        let _guard = self.commit_lock.read();
        Ok(self
            .events
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use diary_core::{ActorId, AuditStamper, EventDraft, Revision};

    fn stamper(actor: &str) -> AuditStamper {
        AuditStamper::new(ActorId::new(actor).unwrap(), Utc::now())
    }

    fn draft(text: &str, day: u32) -> Event {
        let date = Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap();
        EventDraft::new(text, date).into_event().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_initial_revision() {
        let store = InMemoryEventStore::new();
        assert!(store.is_empty());

        let saved = store
            .commit(
                vec![Change::added(draft("first", 1)), Change::added(draft("second", 2))],
                &stamper("u1"),
            )
            .await
            .unwrap();

        assert_eq!(saved[0].id, EventId::new(1));
        assert_eq!(saved[1].id, EventId::new(2));
        assert!(saved.iter().all(|e| e.revision == Revision::INITIAL));
        assert_eq!(store.len(), 2);
        assert!(store.exists(EventId::new(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_remove() {
        let store = InMemoryEventStore::new();
        let first = store
            .commit(vec![Change::added(draft("first", 1))], &stamper("u1"))
            .await
            .unwrap();
        assert!(store.remove(first[0].id).await.unwrap());
        assert!(!store.remove(first[0].id).await.unwrap());

        let second = store
            .commit(vec![Change::added(draft("second", 1))], &stamper("u1"))
            .await
            .unwrap();
        assert_eq!(second[0].id, EventId::new(2));
    }

    #[tokio::test]
    async fn test_update_bumps_revision() {
        let store = InMemoryEventStore::new();
        let mut event = store
            .commit(vec![Change::added(draft("first", 1))], &stamper("u1"))
            .await
            .unwrap()
            .remove(0);

        event.text = "first, edited".to_string();
        let expected = event.revision;
        let updated = store
            .commit(vec![Change::modified(event, expected)], &stamper("u1"))
            .await
            .unwrap()
            .remove(0);

        assert_eq!(updated.revision, Revision::new(2));
        let stored = store.find(updated.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "first, edited");
        assert!(stored.modified_at.is_some());
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = InMemoryEventStore::new();
        let event = store
            .commit(vec![Change::added(draft("first", 1))], &stamper("u1"))
            .await
            .unwrap()
            .remove(0);

        store
            .commit(
                vec![Change::modified(event.clone(), event.revision)],
                &stamper("u1"),
            )
            .await
            .unwrap();

        let err = store
            .commit(vec![Change::modified(event, Revision::INITIAL)], &stamper("u2"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Conflict {
                actual: Some(Revision(2)),
                ..
            }
        ));
    }
}
