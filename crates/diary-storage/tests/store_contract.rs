//! Behaviour every event store must share
//!
//! Each test runs against both backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use diary_core::{
    ActorId, AuditStamper, Change, Event, EventDraft, EventFilter, EventId, PageWindow, Revision,
    WriteInterceptor,
};
use diary_storage::{
    EventStore, InMemoryEventStore, RedbEventStore, RedbEventStoreConfig, StorageError,
};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

/// Both backends; the TempDir keeps the redb file alive for the test
fn stores() -> Vec<(&'static str, Arc<dyn EventStore>, Option<TempDir>)> {
    let temp_dir = TempDir::new().unwrap();
    let memory: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    let redb: Arc<dyn EventStore> = Arc::new(
        RedbEventStore::open(RedbEventStoreConfig::with_path(
            temp_dir.path().join("contract.redb"),
        ))
        .unwrap(),
    );

    vec![("memory", memory, None), ("redb", redb, Some(temp_dir))]
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, d, 8, 0, 0).unwrap()
}

fn actor(id: &str) -> ActorId {
    ActorId::new(id).unwrap()
}

fn stamper(id: &str) -> AuditStamper {
    AuditStamper::new(actor(id), day(28))
}

fn unsaved(text: &str, d: u32) -> Event {
    EventDraft::new(text, day(d)).into_event().unwrap()
}

async fn insert(store: &dyn EventStore, owner: &str, text: &str, d: u32) -> Event {
    store
        .commit(vec![Change::added(unsaved(text, d))], &stamper(owner))
        .await
        .unwrap()
        .remove(0)
}

/// Counts how often the commit reached the interceptor
#[derive(Default)]
struct CountingInterceptor {
    calls: AtomicUsize,
}

impl WriteInterceptor<Event> for CountingInterceptor {
    fn before_commit(&self, changes: &mut [Change<Event>]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        stamper("counted").apply(changes);
    }
}

// ============================================================================
// Commit semantics
// ============================================================================

#[tokio::test]
async fn test_failed_batch_persists_nothing() {
    for (name, store, _guard) in stores() {
        let existing = insert(store.as_ref(), "u1", "already here", 1).await;
        let before = store.count(&EventFilter::default()).await.unwrap();

        // Stale revision on the second change sinks the whole batch
        let interceptor = CountingInterceptor::default();
        let err = store
            .commit(
                vec![
                    Change::added(unsaved("would be new", 2)),
                    Change::modified(existing.clone(), Revision::new(7)),
                ],
                &interceptor,
            )
            .await
            .unwrap_err();

        assert!(err.is_conflict(), "{name}");
        assert_eq!(interceptor.calls.load(Ordering::SeqCst), 0, "{name}");
        assert_eq!(
            store.count(&EventFilter::default()).await.unwrap(),
            before,
            "{name}"
        );

        let stored = store.find(existing.id).await.unwrap().unwrap();
        assert_eq!(stored, existing, "{name}: no stamp leaked");
    }
}

#[tokio::test]
async fn test_interceptor_stamps_are_persisted() {
    for (name, store, _guard) in stores() {
        let mut draft = unsaved("stamped", 3);
        draft.created_by = actor("forged");

        let interceptor = CountingInterceptor::default();
        let saved = store
            .commit(vec![Change::added(draft)], &interceptor)
            .await
            .unwrap()
            .remove(0);

        assert_eq!(interceptor.calls.load(Ordering::SeqCst), 1, "{name}");
        let stored = store.find(saved.id).await.unwrap().unwrap();
        assert_eq!(stored.created_by, actor("counted"), "{name}");
        assert_eq!(stored.created_at, day(28), "{name}");
    }
}

#[tokio::test]
async fn test_concurrent_updates_one_wins() {
    for (name, store, _guard) in stores() {
        let event = insert(store.as_ref(), "u1", "contended", 1).await;

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = Arc::clone(&store);
            let mut edit = event.clone();
            edit.text = format!("edit number {i}");
            handles.push(tokio::spawn(async move {
                store
                    .commit(vec![Change::modified(edit, Revision::INITIAL)], &stamper("u1"))
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StorageError::Conflict { actual, .. }) => {
                    assert_eq!(actual, Some(Revision::new(2)), "{name}")
                }
                Err(other) => panic!("{name}: unexpected error {other}"),
            }
        }
        assert_eq!(wins, 1, "{name}");

        let stored = store.find(event.id).await.unwrap().unwrap();
        assert_eq!(stored.revision, Revision::new(2), "{name}");
    }
}

#[tokio::test]
async fn test_update_of_removed_event_conflicts() {
    for (name, store, _guard) in stores() {
        let event = insert(store.as_ref(), "u1", "gone soon", 1).await;
        assert!(store.remove(event.id).await.unwrap(), "{name}");

        let err = store
            .commit(
                vec![Change::modified(event.clone(), event.revision)],
                &stamper("u1"),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, StorageError::Conflict { actual: None, .. }),
            "{name}"
        );
        assert!(!store.exists(event.id).await.unwrap(), "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_never_see_partial_batch() {
    const BATCHES: usize = 20;
    const BATCH_SIZE: usize = 200;

    for (name, store, _guard) in stores() {
        let writer_store = Arc::clone(&store);
        let writer = tokio::spawn(async move {
            for _ in 0..BATCHES {
                let batch = (0..BATCH_SIZE)
                    .map(|i| Change::added(unsaved("bulk entry", (i % 28) as u32 + 1)))
                    .collect();
                writer_store.commit(batch, &stamper("u1")).await.unwrap();
            }
        });

        let mut partial = Vec::new();
        while !writer.is_finished() {
            let counted = store.count(&EventFilter::default()).await.unwrap();
            let everything = PageWindow {
                offset: 0,
                limit: usize::MAX,
            };
            let listed = store
                .query(&EventFilter::default(), everything)
                .await
                .unwrap()
                .len();
            for seen in [counted, listed] {
                if seen % BATCH_SIZE != 0 {
                    partial.push(seen);
                }
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        assert!(partial.is_empty(), "{name}: saw half-applied batches {partial:?}");
        assert_eq!(
            store.count(&EventFilter::default()).await.unwrap(),
            BATCHES * BATCH_SIZE,
            "{name}"
        );
    }
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_query_order_filter_and_window() {
    for (name, store, _guard) in stores() {
        let store = store.as_ref();
        insert(store, "u1", "Breakfast in Rome", 3).await;
        insert(store, "u2", "Lunch in Rome", 5).await;
        let tie_low = insert(store, "u1", "Dinner in Paris", 4).await;
        let tie_high = insert(store, "u1", "Supper in Paris", 4).await;
        insert(store, "u1", "Walk", 1).await;

        let mine = EventFilter::default().owned_by(actor("u1"));
        let all_mine = store.query(&mine, PageWindow::for_page(0, 10)).await.unwrap();
        let texts: Vec<&str> = all_mine.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Supper in Paris", "Dinner in Paris", "Breakfast in Rome", "Walk"],
            "{name}"
        );
        assert!(tie_high.id > tie_low.id);
        assert_eq!(store.count(&mine).await.unwrap(), 4, "{name}");

        let rome = EventFilter::default().containing("Rome");
        assert_eq!(store.count(&rome).await.unwrap(), 2, "{name}");
        assert_eq!(
            store.count(&EventFilter::default().containing("rome")).await.unwrap(),
            0,
            "{name}: search is case-sensitive"
        );

        let second_page = store.query(&mine, PageWindow::for_page(1, 3)).await.unwrap();
        assert_eq!(second_page.len(), 1, "{name}");
        assert_eq!(second_page[0].text, "Walk", "{name}");

        let past_end = store.query(&mine, PageWindow::for_page(5, 3)).await.unwrap();
        assert!(past_end.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_find_missing() {
    for (name, store, _guard) in stores() {
        assert!(store.find(EventId::new(99)).await.unwrap().is_none(), "{name}");
        assert!(!store.exists(EventId::new(99)).await.unwrap(), "{name}");
        assert!(!store.remove(EventId::new(99)).await.unwrap(), "{name}");
    }
}
