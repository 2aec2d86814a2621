//! Core traits for Diary
//!
//! ## Key Traits
//!
//! - [`EventStore`]: Keyed event persistence with optimistic concurrency
//! - [`Clock`]: Time abstraction for testability

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audit::{Change, WriteInterceptor};
use crate::error::StorageError;
use crate::event::{Event, EventId};
use crate::identity::ActorId;

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::Mutex::new(start),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Restriction applied to a listing query
///
/// Both fields are conjunctive; `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Only events created by this actor
    pub owner: Option<ActorId>,
    /// Only events whose text contains this substring (case-sensitive)
    pub text_contains: Option<String>,
}

impl EventFilter {
    pub fn owned_by(mut self, owner: ActorId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.text_contains = Some(needle.into());
        self
    }

    /// Check whether an event passes the filter
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(owner) = &self.owner
            && !event.is_owned_by(owner)
        {
            return false;
        }
        if let Some(needle) = &self.text_contains
            && !event.text_contains(needle)
        {
            return false;
        }
        true
    }
}

/// Slice of an ordered listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    /// Window for a zero-based page number
    pub fn for_page(page: u32, page_size: usize) -> Self {
        Self {
            offset: (page as usize).saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// Listing order: most recent date first, then highest id first
pub fn newest_first(a: &Event, b: &Event) -> Ordering {
    b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id))
}

/// Keyed event persistence
///
/// Implementations own durable storage and guarantee that one
/// [`commit`](EventStore::commit) is atomic: either every change and its
/// stamps become visible, or none do.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Look up an event by id
    async fn find(&self, id: EventId) -> Result<Option<Event>, StorageError>;

    /// Check whether an event exists
    async fn exists(&self, id: EventId) -> Result<bool, StorageError> {
        Ok(self.find(id).await?.is_some())
    }

    /// Atomically apply a batch of changes
    ///
    /// Every `Modified` change is checked against the stored revision
    /// first; a mismatch or a missing record fails the whole batch with
    /// [`StorageError::Conflict`]. The interceptor then runs over the batch,
    /// ids and revisions are assigned, and the records are written.
    ///
    /// Returns the stored records in batch order.
    async fn commit(
        &self,
        changes: Vec<Change<Event>>,
        interceptor: &dyn WriteInterceptor<Event>,
    ) -> Result<Vec<Event>, StorageError>;

    /// Hard-delete an event, returning whether it existed
    async fn remove(&self, id: EventId) -> Result<bool, StorageError>;

    /// Filtered events in [`newest_first`] order, restricted to `window`
    async fn query(
        &self,
        filter: &EventFilter,
        window: PageWindow,
    ) -> Result<Vec<Event>, StorageError>;

    /// Number of events passing `filter`
    async fn count(&self, filter: &EventFilter) -> Result<usize, StorageError>;
}
