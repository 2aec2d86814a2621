//! # Diary Service
//!
//! Request orchestration for Diary.
//!
//! This crate provides [`EventService`], which ties together:
//! - Access policy ([`AccessController`])
//! - Audit stamping inside the store commit ([`AuditStamper`])
//! - Scoped listings ([`QueryScoper`])
//! - An event store (in-memory or redb)
//!
//! The presentation layer authenticates the caller, builds an [`Actor`] and
//! passes it to every call. Nothing here keeps per-request state.
//!
//! ## Example
//!
//! ```rust,ignore
//! use diary_core::{Actor, ActorId, EventDraft, EventPatch};
//! use diary_service::{EventService, ServiceConfig};
//!
//! let service = EventService::in_memory(ServiceConfig::from_env());
//! let actor = Actor::new(ActorId::new("u1")?);
//!
//! let event = service.create(&actor, EventDraft::new("Day at the lake", chrono::Utc::now())).await?;
//! service.update(&actor, event.id, EventPatch::text("Day at the lake, with rain")).await?;
//!
//! let page = service.list(&actor, Some("lake"), 0).await?;
//! assert_eq!(page.events.len(), 1);
//! ```

mod config;
mod error;
mod scoper;

pub use config::{DEFAULT_PAGE_SIZE, PAGE_SIZE_ENV, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use scoper::{EventPage, QueryScoper};

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use diary_core::{
    AccessController, Actor, AuditStamper, Change, Clock, Decision, Event, EventDraft, EventId,
    EventPatch, EventStore, Operation, Revision, StorageError, SystemClock, WriteInterceptor,
};
use diary_storage::{InMemoryEventStore, RedbEventStore, RedbEventStoreConfig};

/// Audit stamper that reports what it stamped
struct LoggedStamper(AuditStamper);

impl WriteInterceptor<Event> for LoggedStamper {
    fn before_commit(&self, changes: &mut [Change<Event>]) {
        let summary = self.0.apply(changes);
        debug!(
            actor = %self.0.actor(),
            created = summary.created,
            modified = summary.modified,
            "Stamped audit fields"
        );
    }
}

/// Authorization-scoped access to diary events
///
/// Every operation takes the requesting [`Actor`] explicitly. Cloning is
/// cheap; clones share the same store and clock.
#[derive(Clone)]
pub struct EventService {
    /// Event persistence
    store: Arc<dyn EventStore>,
    /// Source of audit timestamps
    clock: Arc<dyn Clock>,
    /// Allow/deny policy
    access: AccessController,
    /// Listing builder, sharing the store
    scoper: QueryScoper,
    /// Service configuration
    config: ServiceConfig,
}

impl EventService {
    /// Create a service over an existing store and clock
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, config: ServiceConfig) -> Self {
        let scoper = QueryScoper::new(Arc::clone(&store), config.page_size);
        Self {
            store,
            clock,
            access: AccessController::new(),
            scoper,
            config,
        }
    }

    /// Service over a fresh in-memory store and the system clock
    pub fn in_memory(config: ServiceConfig) -> Self {
        Self::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Service over a redb database and the system clock
    #[instrument(skip_all, fields(path = %storage.db_path.display()))]
    pub fn open(config: ServiceConfig, storage: RedbEventStoreConfig) -> ServiceResult<Self> {
        let store = RedbEventStore::open(storage)?;
        info!(page_size = config.page_size, "Event service ready");
        Ok(Self::new(Arc::new(store), Arc::new(SystemClock), config))
    }

    /// Get the configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get the underlying store
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    fn stamper_for(&self, actor: &Actor) -> LoggedStamper {
        LoggedStamper(AuditStamper::new(actor.id.clone(), self.clock.now_utc()))
    }

    fn check(
        &self,
        actor: &Actor,
        operation: Operation,
        id: EventId,
        event: Option<&Event>,
    ) -> ServiceResult<()> {
        match self.access.authorize(actor, operation, event) {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                warn!(actor = %actor.id, id = %id, operation = %operation, "Access denied");
                Err(ServiceError::Forbidden {
                    actor: actor.id.clone(),
                    id,
                    operation,
                })
            }
        }
    }

    async fn commit_one(&self, change: Change<Event>, actor: &Actor) -> ServiceResult<Event> {
        let stamper = self.stamper_for(actor);
        let mut saved = self.store.commit(vec![change], &stamper).await?;
        saved
            .pop()
            .ok_or_else(|| StorageError::database("commit returned no record").into())
    }

    /// Create an event owned by `actor`
    ///
    /// Creator and creation time come from the actor and the clock; any
    /// values supplied in the draft are discarded.
    #[instrument(skip(self, actor, draft), fields(actor = %actor.id))]
    pub async fn create(&self, actor: &Actor, draft: EventDraft) -> ServiceResult<Event> {
        self.check(actor, Operation::Create, EventId::UNASSIGNED, None)?;

        let event = draft.into_event()?;
        let saved = self.commit_one(Change::added(event), actor).await?;

        info!(id = %saved.id, "Created event");
        Ok(saved)
    }

    /// Create several events in one commit
    ///
    /// Every draft is validated before anything is written; the first
    /// invalid draft fails the whole batch. All events share one creation
    /// instant.
    #[instrument(skip(self, actor, drafts), fields(actor = %actor.id, count = drafts.len()))]
    pub async fn create_batch(
        &self,
        actor: &Actor,
        drafts: Vec<EventDraft>,
    ) -> ServiceResult<Vec<Event>> {
        self.check(actor, Operation::Create, EventId::UNASSIGNED, None)?;

        let changes = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                draft
                    .into_event()
                    .map(Change::added)
                    .map_err(|source| ServiceError::InvalidBatch { index, source })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let stamper = self.stamper_for(actor);
        let saved = self.store.commit(changes, &stamper).await?;

        info!(count = saved.len(), "Created events");
        Ok(saved)
    }

    /// Look up an event and check that `actor` may perform `operation` on it
    ///
    /// A missing event is [`ServiceError::NotFound`]; an existing event the
    /// actor may not touch is [`ServiceError::Forbidden`].
    pub async fn load_for(
        &self,
        actor: &Actor,
        id: EventId,
        operation: Operation,
    ) -> ServiceResult<Event> {
        let event = self
            .store
            .find(id)
            .await?
            .ok_or(ServiceError::NotFound(id))?;

        self.check(actor, operation, id, Some(&event))?;
        Ok(event)
    }

    /// Read one event
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get(&self, actor: &Actor, id: EventId) -> ServiceResult<Event> {
        self.load_for(actor, id, Operation::Read).await
    }

    /// Update an event against the revision read in this call
    #[instrument(skip(self, actor, patch), fields(actor = %actor.id))]
    pub async fn update(&self, actor: &Actor, id: EventId, patch: EventPatch) -> ServiceResult<Event> {
        self.apply_update(actor, id, patch, None).await
    }

    /// Update an event only if it is still at the revision the caller saw
    ///
    /// Use this when the patch was built from an earlier read, for example an
    /// edit form; a concurrent change in between yields
    /// [`ServiceError::Conflict`].
    #[instrument(skip(self, actor, patch), fields(actor = %actor.id))]
    pub async fn update_if_unchanged(
        &self,
        actor: &Actor,
        id: EventId,
        seen: Revision,
        patch: EventPatch,
    ) -> ServiceResult<Event> {
        self.apply_update(actor, id, patch, Some(seen)).await
    }

    async fn apply_update(
        &self,
        actor: &Actor,
        id: EventId,
        patch: EventPatch,
        seen: Option<Revision>,
    ) -> ServiceResult<Event> {
        let mut event = self.load_for(actor, id, Operation::Update).await?;
        let expected = seen.unwrap_or(event.revision);

        event.apply_patch(&patch);
        event.validate()?;

        match self.commit_one(Change::modified(event, expected), actor).await {
            Ok(saved) => {
                info!(id = %saved.id, revision = %saved.revision, "Updated event");
                Ok(saved)
            }
            Err(ServiceError::Storage(err)) if err.is_conflict() => {
                if self.store.exists(id).await? {
                    warn!(id = %id, "Update lost a concurrency race");
                    Err(ServiceError::Conflict(id))
                } else {
                    debug!(id = %id, "Event deleted during update");
                    Err(ServiceError::NotFound(id))
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Delete an event
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete(&self, actor: &Actor, id: EventId) -> ServiceResult<()> {
        self.load_for(actor, id, Operation::Delete).await?;

        if !self.store.remove(id).await? {
            debug!(id = %id, "Event deleted concurrently");
            return Err(ServiceError::NotFound(id));
        }

        info!(id = %id, "Deleted event");
        Ok(())
    }

    /// List one page of the events `actor` may see, newest first
    ///
    /// `search` restricts the listing to events whose text contains it
    /// (case-sensitive). `page` is zero-based.
    pub async fn list(
        &self,
        actor: &Actor,
        search: Option<&str>,
        page: u32,
    ) -> ServiceResult<EventPage> {
        Ok(self.scoper.list(actor, search, page).await?)
    }
}
