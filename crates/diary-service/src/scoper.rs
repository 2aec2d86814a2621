//! Scoped, searchable, paginated event listings
//!
//! The base set comes from the actor's [`AccessScope`], so a listing can
//! never show an event that a single-record read would refuse.

use std::sync::Arc;

use diary_core::{AccessScope, Actor, Event, EventFilter, EventStore, PageWindow, StorageError};
use tracing::{debug, instrument};

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPage {
    /// Events on this page, newest first
    pub events: Vec<Event>,
    /// Zero-based page number
    pub page: u32,
    /// Size of the scoped and filtered set when the page was read
    pub total: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl EventPage {
    pub fn new(events: Vec<Event>, page: u32, page_size: usize, total: usize) -> Self {
        let seen = (page as usize).saturating_add(1).saturating_mul(page_size);
        Self {
            events,
            page,
            total,
            has_previous: page > 0,
            has_next: seen < total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Builds listings restricted to what an actor may see
#[derive(Clone)]
pub struct QueryScoper {
    store: Arc<dyn EventStore>,
    page_size: usize,
}

impl QueryScoper {
    pub fn new(store: Arc<dyn EventStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Store filter for an actor and optional search text
    ///
    /// Blank search text means no search.
    pub fn filter_for(actor: &Actor, search: Option<&str>) -> EventFilter {
        EventFilter {
            owner: AccessScope::for_actor(actor).owner().cloned(),
            text_contains: search
                .filter(|text| !text.trim().is_empty())
                .map(str::to_string),
        }
    }

    /// List one page of the events `actor` may see
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn list(
        &self,
        actor: &Actor,
        search: Option<&str>,
        page: u32,
    ) -> Result<EventPage, StorageError> {
        let filter = Self::filter_for(actor, search);

        let total = self.store.count(&filter).await?;
        let events = self
            .store
            .query(&filter, PageWindow::for_page(page, self.page_size))
            .await?;

        debug!(total, shown = events.len(), "Listed events");
        Ok(EventPage::new(events, page, self.page_size, total))
    }
}
