//! Actor identity
//!
//! The core never authenticates anyone. It receives an already
//! authenticated [`Actor`] (id + role set) from the presentation layer and
//! passes it explicitly through every call.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Role name that grants unconditional access to every event
pub const ADMINISTRATORS_ROLE: &str = "Administrators";

/// Maximum length of an actor id, matching the identity provider's user key
pub const MAX_ACTOR_ID_LEN: usize = 450;

/// Opaque identifier of an authenticated actor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    /// Create an actor id, rejecting empty or oversized values
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentityError::Empty);
        }
        let len = id.chars().count();
        if len > MAX_ACTOR_ID_LEN {
            return Err(IdentityError::TooLong {
                max: MAX_ACTOR_ID_LEN,
                actual: len,
            });
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder creator on a record that has not been stamped yet
    pub(crate) fn unassigned() -> Self {
        Self(String::new())
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActorId {
    type Error = IdentityError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

impl AsRef<str> for ActorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A role carried by an actor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full access to all events
    Administrator,
    /// Any other role; carries no extra rights in the diary
    Named(String),
}

impl Role {
    /// Map a role name from the identity provider onto a [`Role`]
    ///
    /// Role names are compared case-sensitively.
    pub fn from_name(name: &str) -> Self {
        if name == ADMINISTRATORS_ROLE {
            Role::Administrator
        } else {
            Role::Named(name.to_string())
        }
    }

    /// The role name as known to the identity provider
    pub fn name(&self) -> &str {
        match self {
            Role::Administrator => ADMINISTRATORS_ROLE,
            Role::Named(name) => name,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The authenticated entity making a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable actor id
    pub id: ActorId,
    /// Roles granted by the identity provider
    pub roles: BTreeSet<Role>,
}

impl Actor {
    /// Create an actor without roles (a plain owner)
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            roles: BTreeSet::new(),
        }
    }

    /// Create an actor holding the administrator role
    pub fn administrator(id: ActorId) -> Self {
        Self::new(id).with_role(Role::Administrator)
    }

    /// Build an actor from the identity provider's id and role names
    pub fn from_claims<'a>(
        id: impl Into<String>,
        role_names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, IdentityError> {
        let roles = role_names.into_iter().map(Role::from_name).collect();
        Ok(Self {
            id: ActorId::new(id)?,
            roles,
        })
    }

    /// Add a role
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    /// Check if the actor holds the administrator role
    pub fn is_administrator(&self) -> bool {
        self.roles.contains(&Role::Administrator)
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
