//! Access policy
//!
//! Administrators may do anything. Everyone else may read, update and
//! delete only the events they created, and may create new ones.
//!
//! The ownership rule is written down once, as [`AccessScope`]. Single
//! record decisions ([`AccessController::authorize`]) and scoped listings
//! (see `diary-service`) both derive visibility from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::identity::{Actor, ActorId};

/// Operations an actor can attempt on events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Whether the operation targets an existing record
    pub fn is_record_bound(&self) -> bool {
        !matches!(self, Operation::Create)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// The set of events an actor may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// Every event
    All,
    /// Only events created by this actor
    OwnedBy(ActorId),
}

impl AccessScope {
    /// Scope granted to an actor
    pub fn for_actor(actor: &Actor) -> Self {
        if actor.is_administrator() {
            AccessScope::All
        } else {
            AccessScope::OwnedBy(actor.id.clone())
        }
    }

    /// Check whether an event falls inside this scope
    pub fn permits(&self, event: &Event) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::OwnedBy(owner) => event.is_owned_by(owner),
        }
    }

    /// The owner restriction, if any
    pub fn owner(&self) -> Option<&ActorId> {
        match self {
            AccessScope::All => None,
            AccessScope::OwnedBy(owner) => Some(owner),
        }
    }
}

/// Stateless allow/deny policy for event operations
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessController;

impl AccessController {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `actor` may perform `operation` on `event`
    ///
    /// Record-bound operations without a record are denied.
    pub fn authorize(&self, actor: &Actor, operation: Operation, event: Option<&Event>) -> Decision {
        if actor.is_administrator() {
            return Decision::Allow;
        }

        if !operation.is_record_bound() {
            return Decision::Allow;
        }

        match event {
            Some(event) if AccessScope::for_actor(actor).permits(event) => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}
