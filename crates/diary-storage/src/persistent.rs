//! Persistent event store backed by redb
//!
//! Events are encoded with postcard into the `events` table, keyed by id.
//! The id counter lives in the `meta` table so ids survive restarts and are
//! never reused. Every commit runs in one redb write transaction; if any
//! step fails the transaction is dropped and nothing becomes visible.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use diary_core::{
    Change, ChangeKind, Event, EventFilter, EventId, EventStore, PageWindow, StorageError,
    WriteInterceptor, newest_first,
};
use redb::{Builder, Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, info, instrument, trace};

use crate::commit::{check_revision, seal};

// Key: event id, Value: postcard-encoded Event
const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");

// Key: counter name, Value: counter
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_EVENT_ID: &str = "next_event_id";

/// Configuration for the redb event store
#[derive(Debug, Clone)]
pub struct RedbEventStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbEventStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/diary.redb"),
            cache_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl RedbEventStoreConfig {
    /// Config for a database file at `db_path`
    pub fn with_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = bytes;
        self
    }
}

fn db_err(err: impl Display) -> StorageError {
    StorageError::database(err)
}

fn encode(event: &Event) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(event).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Event, StorageError> {
    postcard::from_bytes(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
}

/// redb implementation of [`EventStore`]
pub struct RedbEventStore {
    db: Arc<Database>,
    config: RedbEventStoreConfig,
}

impl RedbEventStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbEventStoreConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Builder::new()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(db_err)?;

        info!("Opened event database");

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.init_tables()?;

        Ok(store)
    }

    /// Create both tables if they don't exist
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        write_txn.open_table(EVENTS).map_err(db_err)?;
        write_txn.open_table(META).map_err(db_err)?;
        write_txn.commit().map_err(db_err)?;

        debug!("Initialized event tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbEventStoreConfig {
        &self.config
    }

    /// Number of stored events
    pub fn len(&self) -> Result<u64, StorageError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(EVENTS).map_err(db_err)?;
        table.len().map_err(db_err)
    }

    /// Check if the store holds no events
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Decode every stored event that passes `filter`
    fn scan(&self, filter: &EventFilter) -> Result<Vec<Event>, StorageError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(EVENTS).map_err(db_err)?;

        let mut matching = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, value) = entry.map_err(db_err)?;
            let event = decode(value.value())?;
            if filter.matches(&event) {
                matching.push(event);
            }
        }
        Ok(matching)
    }
}

#[async_trait]
impl EventStore for RedbEventStore {
    async fn find(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(EVENTS).map_err(db_err)?;

        let value = table.get(id.as_u64()).map_err(db_err)?;
        value.map(|v| decode(v.value())).transpose()
    }

    #[instrument(skip(self, changes, interceptor), fields(count = changes.len()))]
    async fn commit(
        &self,
        mut changes: Vec<Change<Event>>,
        interceptor: &dyn WriteInterceptor<Event>,
    ) -> Result<Vec<Event>, StorageError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;

        let sealed = {
            let mut events = write_txn.open_table(EVENTS).map_err(db_err)?;
            let mut meta = write_txn.open_table(META).map_err(db_err)?;

            for change in &changes {
                if let ChangeKind::Modified { expected } = change.kind {
                    let id = change.record.id;
                    let actual = events
                        .get(id.as_u64())
                        .map_err(db_err)?
                        .map(|v| decode(v.value()))
                        .transpose()?
                        .map(|stored| stored.revision);
                    check_revision(id, expected, actual)?;
                }
            }

            interceptor.before_commit(&mut changes);

            let mut next_id = meta
                .get(NEXT_EVENT_ID)
                .map_err(db_err)?
                .map(|v| v.value())
                .unwrap_or(1);
            let sealed = seal(changes, || {
                let id = EventId::new(next_id);
                next_id += 1;
                id
            });

            for event in &sealed {
                let bytes = encode(event)?;
                events
                    .insert(event.id.as_u64(), bytes.as_slice())
                    .map_err(db_err)?;
                trace!(id = %event.id, revision = %event.revision, "Writing event");
            }
            meta.insert(NEXT_EVENT_ID, next_id).map_err(db_err)?;

            sealed
        };

        write_txn.commit().map_err(db_err)?;

        debug!(count = sealed.len(), "Committed changes");
        Ok(sealed)
    }

    async fn remove(&self, id: EventId) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;

        let removed = {
            let mut table = write_txn.open_table(EVENTS).map_err(db_err)?;
            table.remove(id.as_u64()).map_err(db_err)?.is_some()
        };

        write_txn.commit().map_err(db_err)?;

        trace!(id = %id, removed, "Removed event");
        Ok(removed)
    }

    async fn query(
        &self,
        filter: &EventFilter,
        window: PageWindow,
    ) -> Result<Vec<Event>, StorageError> {
        let mut matching = self.scan(filter)?;
        matching.sort_by(newest_first);

        Ok(matching
            .into_iter()
            .skip(window.offset)
            .take(window.limit)
            .collect())
    }

    async fn count(&self, filter: &EventFilter) -> Result<usize, StorageError> {
        Ok(self.scan(filter)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use diary_core::{ActorId, AuditStamper, EventDraft, Revision};
    use tempfile::TempDir;

    fn create_test_store() -> (RedbEventStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbEventStoreConfig::with_path(temp_dir.path().join("test.redb"));
        let store = RedbEventStore::open(config).unwrap();
        (store, temp_dir)
    }

    fn stamper() -> AuditStamper {
        AuditStamper::new(ActorId::new("u1").unwrap(), Utc::now())
    }

    fn draft(text: &str) -> Event {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        EventDraft::new(text, date).into_event().unwrap()
    }

    #[tokio::test]
    async fn test_commit_and_find() {
        let (store, _temp) = create_test_store();
        assert!(store.is_empty().unwrap());

        let saved = store
            .commit(vec![Change::added(draft("written to disk"))], &stamper())
            .await
            .unwrap()
            .remove(0);

        let found = store.find(saved.id).await.unwrap().unwrap();
        assert_eq!(found, saved);
        assert_eq!(found.created_by.as_str(), "u1");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _temp) = create_test_store();
        let saved = store
            .commit(vec![Change::added(draft("short lived"))], &stamper())
            .await
            .unwrap()
            .remove(0);

        assert!(store.remove(saved.id).await.unwrap());
        assert!(store.find(saved.id).await.unwrap().is_none());
        assert!(!store.remove(saved.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_vanished_record_conflicts() {
        let (store, _temp) = create_test_store();
        let mut ghost = draft("never stored");
        ghost.id = EventId::new(42);

        let err = store
            .commit(vec![Change::modified(ghost, Revision::INITIAL)], &stamper())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { actual: None, .. }));
    }

    #[test]
    fn test_reopen_keeps_events_and_id_counter() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reopen.redb");

        let first_id = {
            let store = RedbEventStore::open(RedbEventStoreConfig::with_path(&path)).unwrap();
            let saved = tokio_test::block_on(
                store.commit(vec![Change::added(draft("before restart"))], &stamper()),
            )
            .unwrap();
            tokio_test::block_on(store.remove(saved[0].id)).unwrap();
            tokio_test::block_on(
                store.commit(vec![Change::added(draft("kept"))], &stamper()),
            )
            .unwrap()[0]
                .id
        };

        let store = RedbEventStore::open(RedbEventStoreConfig::with_path(&path)).unwrap();
        assert!(tokio_test::block_on(store.exists(first_id)).unwrap());

        let after = tokio_test::block_on(
            store.commit(vec![Change::added(draft("after restart"))], &stamper()),
        )
        .unwrap();
        assert_eq!(after[0].id, EventId::new(3));
    }
}
