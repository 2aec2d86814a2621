//! Diary events
//!
//! [`Event`] is the only persisted entity. [`EventDraft`] and
//! [`EventPatch`] are the shapes the presentation layer binds its forms to;
//! both may carry client-supplied provenance fields, which are never
//! trusted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::Auditable;
use crate::error::{FieldViolation, ValidationError};
use crate::identity::ActorId;

/// Minimum event text length, in characters
pub const TEXT_MIN_CHARS: usize = 3;

/// Maximum event text length, in characters
pub const TEXT_MAX_CHARS: usize = 8000;

/// System-assigned event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl EventId {
    /// Id carried by an event the store has not inserted yet
    pub const UNASSIGNED: EventId = EventId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Whether the store has assigned this id
    pub fn is_assigned(&self) -> bool {
        *self != Self::UNASSIGNED
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optimistic concurrency marker
///
/// Owned by the store: 1 after insert, incremented by every committed
/// update. Writers send back the revision they read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Revision(pub u64);

impl Revision {
    /// Revision of a freshly inserted record
    pub const INITIAL: Revision = Revision(1);

    pub fn new(revision: u64) -> Self {
        Self(revision)
    }

    /// The revision following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dated diary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub text: String,
    pub date: DateTime<Utc>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub modified_by: Option<ActorId>,
    pub modified_at: Option<DateTime<Utc>>,
    pub revision: Revision,
}

impl Event {
    /// Check whether the given actor created this event
    pub fn is_owned_by(&self, actor: &ActorId) -> bool {
        &self.created_by == actor
    }

    /// Check whether the text contains `needle` (case-sensitive)
    pub fn text_contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// Apply a patch, leaving provenance fields untouched
    pub fn apply_patch(&mut self, patch: &EventPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
    }

    /// Validate the field constraints of a stored or patched event
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        check_text(&self.text, &mut violations);
        finish(violations)
    }
}

impl Auditable for Event {
    fn created_by_mut(&mut self) -> Option<&mut ActorId> {
        Some(&mut self.created_by)
    }

    fn created_at_mut(&mut self) -> Option<&mut DateTime<Utc>> {
        Some(&mut self.created_at)
    }

    fn modified_by_mut(&mut self) -> Option<&mut Option<ActorId>> {
        Some(&mut self.modified_by)
    }

    fn modified_at_mut(&mut self) -> Option<&mut Option<DateTime<Utc>>> {
        Some(&mut self.modified_at)
    }
}

/// Input for creating an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub text: String,
    pub date: Option<DateTime<Utc>>,
    /// Client-supplied creator; always overwritten on create
    pub created_by: Option<ActorId>,
    /// Client-supplied creation time; always overwritten on create
    pub created_at: Option<DateTime<Utc>>,
}

impl EventDraft {
    pub fn new(text: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            date: Some(date),
            created_by: None,
            created_at: None,
        }
    }

    /// Check text length and date presence
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        check_text(&self.text, &mut violations);
        if self.date.is_none() {
            violations.push(missing_date());
        }
        finish(violations)
    }

    /// Turn a validated draft into an unsaved event
    ///
    /// Id and revision are placeholders until the store assigns them. The
    /// provenance fields keep whatever the client sent; the audit stamper
    /// replaces them inside the commit.
    pub fn into_event(self) -> Result<Event, ValidationError> {
        self.validate()?;
        let date = self.date.ok_or_else(|| ValidationError {
            violations: vec![missing_date()],
        })?;
        Ok(Event {
            id: EventId::UNASSIGNED,
            text: self.text,
            date,
            created_by: self.created_by.unwrap_or_else(ActorId::unassigned),
            created_at: self.created_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
            modified_by: None,
            modified_at: None,
            revision: Revision::default(),
        })
    }
}

/// Partial update of an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    pub text: Option<String>,
    pub date: Option<DateTime<Utc>>,
    /// Ignored: creator never changes after creation
    pub created_by: Option<ActorId>,
    /// Ignored: creation time never changes after creation
    pub created_at: Option<DateTime<Utc>>,
}

impl EventPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Check the fields present in the patch
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        if let Some(text) = &self.text {
            check_text(text, &mut violations);
        }
        finish(violations)
    }
}

fn check_text(text: &str, violations: &mut Vec<FieldViolation>) {
    let len = text.chars().count();
    if len < TEXT_MIN_CHARS {
        violations.push(FieldViolation {
            field: "text",
            message: format!("text must have at least {TEXT_MIN_CHARS} characters"),
        });
    } else if len > TEXT_MAX_CHARS {
        violations.push(FieldViolation {
            field: "text",
            message: format!("text must have at most {TEXT_MAX_CHARS} characters, got {len}"),
        });
    }
}

fn missing_date() -> FieldViolation {
    FieldViolation {
        field: "date",
        message: "date is required".to_string(),
    }
}

fn finish(violations: Vec<FieldViolation>) -> Result<(), ValidationError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}
