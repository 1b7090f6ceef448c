//! Identities to which mutations are attributed.

use super::Pk;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label recorded when no actor is attached to a context.
pub const SYSTEM_ACTOR_NAME: &str = "System";

/// A human user or an automated robot performing mutations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// Interactive user.
    User {
        /// User key.
        pk: Pk,
        /// Display name recorded in history rows.
        name: String,
    },
    /// Automated client.
    Robot {
        /// Robot key.
        pk: Pk,
        /// Display name recorded in history rows.
        name: String,
    },
}

impl Actor {
    /// Creates a user actor.
    #[must_use]
    pub fn user(pk: Pk, name: impl Into<String>) -> Self {
        Self::User {
            pk,
            name: name.into(),
        }
    }

    /// Creates a robot actor.
    #[must_use]
    pub fn robot(pk: Pk, name: impl Into<String>) -> Self {
        Self::Robot {
            pk,
            name: name.into(),
        }
    }

    /// Returns the actor's key.
    #[must_use]
    pub const fn pk(&self) -> Pk {
        match self {
            Self::User { pk, .. } | Self::Robot { pk, .. } => *pk,
        }
    }

    /// Returns the actor's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User { name, .. } | Self::Robot { name, .. } => name,
        }
    }

    /// Returns the discriminated key of the actor.
    #[must_use]
    pub const fn key(&self) -> ActorKey {
        match self {
            Self::User { pk, .. } => ActorKey::User(*pk),
            Self::Robot { pk, .. } => ActorKey::Robot(*pk),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key of an actor, tagged with the column family it is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pk", rename_all = "snake_case")]
pub enum ActorKey {
    /// Key of a user.
    User(Pk),
    /// Key of a robot.
    Robot(Pk),
}

impl ActorKey {
    /// Returns the user key, if this is a user.
    #[must_use]
    pub const fn user_pk(self) -> Option<Pk> {
        match self {
            Self::User(pk) => Some(pk),
            Self::Robot(_) => None,
        }
    }

    /// Returns the robot key, if this is a robot.
    #[must_use]
    pub const fn robot_pk(self) -> Option<Pk> {
        match self {
            Self::Robot(pk) => Some(pk),
            Self::User(_) => None,
        }
    }

    /// Rebuilds a key from the two nullable discriminant columns.
    ///
    /// Returns `None` for the system actor. A row with both columns set is
    /// read as a user, the column written first.
    #[must_use]
    pub const fn from_columns(user_fk: Option<Pk>, robot_fk: Option<Pk>) -> Option<Self> {
        match (user_fk, robot_fk) {
            (Some(pk), _) => Some(Self::User(pk)),
            (None, Some(pk)) => Some(Self::Robot(pk)),
            (None, None) => None,
        }
    }
}
