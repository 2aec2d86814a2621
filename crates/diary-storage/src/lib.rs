//! # Diary Storage
//!
//! Event store backends for Diary.
//!
//! Both backends implement [`diary_core::EventStore`] with the same
//! guarantees: one commit is atomic, updates are checked against the
//! stored [`Revision`](diary_core::Revision), and the write interceptor
//! runs inside the commit so audit stamps are persisted with the write or
//! not at all.
//!
//! ## Features
//!
//! - **InMemoryEventStore**: `DashMap` storage behind a commit lock, for tests and simulation
//! - **RedbEventStore**: redb file database with postcard-encoded records, for production
//!
//! ## Example
//!
//! ```rust,ignore
//! use diary_core::{ActorId, AuditStamper, Change, EventDraft, EventStore};
//! use diary_storage::InMemoryEventStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryEventStore::new();
//!     let actor = ActorId::new("u1").unwrap();
//!     let stamper = AuditStamper::new(actor, chrono::Utc::now());
//!
//!     let event = EventDraft::new("Day at the lake", chrono::Utc::now())
//!         .into_event()
//!         .unwrap();
//!     let saved = store.commit(vec![Change::added(event)], &stamper).await.unwrap();
//!     assert_eq!(saved[0].created_by.as_str(), "u1");
//! }
//! ```

mod commit;
pub mod memory;
pub mod persistent;

// Re-exports
pub use memory::InMemoryEventStore;
pub use persistent::{RedbEventStore, RedbEventStoreConfig};

// Re-export the store trait and its error for convenience
pub use diary_core::{EventStore, StorageError};
