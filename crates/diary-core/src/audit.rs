//! Audit stamping
//!
//! Provenance (who created or last modified a record, and when) is never
//! taken from the client. Stores run a [`WriteInterceptor`] over every
//! pending [`Change`] inside their commit, so a stamp becomes visible only
//! together with the write it belongs to.
//!
//! [`AuditStamper`] is the interceptor that fills the provenance fields.
//! It works over any [`Auditable`] record and skips fields the record type
//! does not have.

use chrono::{DateTime, Utc};

use crate::event::Revision;
use crate::identity::ActorId;

/// Schema-tolerant access to a record's provenance fields
///
/// Every accessor defaults to `None`, meaning "this record type has no such
/// field". Implement only the ones the record actually carries.
pub trait Auditable {
    fn created_by_mut(&mut self) -> Option<&mut ActorId> {
        None
    }

    fn created_at_mut(&mut self) -> Option<&mut DateTime<Utc>> {
        None
    }

    fn modified_by_mut(&mut self) -> Option<&mut Option<ActorId>> {
        None
    }

    fn modified_at_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>> {
        None
    }
}

/// What a pending change does to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Insert a new record; the store assigns its id
    Added,
    /// Replace an existing record, provided its revision still matches
    Modified { expected: Revision },
}

/// A record about to be written, tagged with the kind of write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<R> {
    pub kind: ChangeKind,
    pub record: R,
}

impl<R> Change<R> {
    pub fn added(record: R) -> Self {
        Self {
            kind: ChangeKind::Added,
            record,
        }
    }

    pub fn modified(record: R, expected: Revision) -> Self {
        Self {
            kind: ChangeKind::Modified { expected },
            record,
        }
    }
}

/// Hook run by a store inside its commit, after conflict checks and before
/// any change is applied
pub trait WriteInterceptor<R>: Send + Sync {
    fn before_commit(&self, changes: &mut [Change<R>]);
}

/// Number of records stamped by one [`AuditStamper::apply`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub created: usize,
    pub modified: usize,
}

/// Stamps created/modified provenance with one actor and one instant
///
/// The instant is captured once by the caller, so every record of a batch
/// carries the same timestamp.
#[derive(Debug, Clone)]
pub struct AuditStamper {
    actor: ActorId,
    now: DateTime<Utc>,
}

impl AuditStamper {
    pub fn new(actor: ActorId, now: DateTime<Utc>) -> Self {
        Self { actor, now }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Set `created_by`/`created_at`, overwriting anything already there
    ///
    /// Returns the number of fields the record actually had.
    pub fn stamp_for_create<R: Auditable + ?Sized>(
        record: &mut R,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> usize {
        let mut stamped = 0;
        if let Some(created_by) = record.created_by_mut() {
            *created_by = actor.clone();
            stamped += 1;
        }
        if let Some(created_at) = record.created_at_mut() {
            *created_at = now;
            stamped += 1;
        }
        stamped
    }

    /// Set `modified_by`/`modified_at`; creation fields are not touched
    ///
    /// Returns the number of fields the record actually had.
    pub fn stamp_for_update<R: Auditable + ?Sized>(
        record: &mut R,
        actor: &ActorId,
        now: DateTime<Utc>,
    ) -> usize {
        let mut stamped = 0;
        if let Some(modified_by) = record.modified_by_mut() {
            *modified_by = Some(actor.clone());
            stamped += 1;
        }
        if let Some(modified_at) = record.modified_at_mut() {
            *modified_at = Some(now);
            stamped += 1;
        }
        stamped
    }

    /// Stamp every change of a batch according to its kind
    pub fn apply<R: Auditable>(&self, changes: &mut [Change<R>]) -> AuditSummary {
        let mut summary = AuditSummary::default();
        for change in changes.iter_mut() {
            match change.kind {
                ChangeKind::Added => {
                    Self::stamp_for_create(&mut change.record, &self.actor, self.now);
                    summary.created += 1;
                }
                ChangeKind::Modified { .. } => {
                    Self::stamp_for_update(&mut change.record, &self.actor, self.now);
                    summary.modified += 1;
                }
            }
        }
        summary
    }
}

impl<R: Auditable> WriteInterceptor<R> for AuditStamper {
    fn before_commit(&self, changes: &mut [Change<R>]) {
        self.apply(changes);
    }
}
