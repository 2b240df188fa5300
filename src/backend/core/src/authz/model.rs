//! Identity and membership models: actors, resource identifiers, levels and visibility.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::GatekeeperError;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = GatekeeperError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    GatekeeperError::invalid_input(format!(
                        "invalid {}: {}",
                        stringify!($name),
                        s
                    ))
                    .with_source(e)
                })
            }
        }
    };
}

uuid_id!(
    /// Identifier of a user acting on the platform.
    ActorId
);
uuid_id!(
    /// Identifier of an organization (tenant).
    OrganizationId
);
uuid_id!(
    /// Identifier of a project inside an organization.
    ProjectId
);
uuid_id!(
    /// Identifier of a project environment; secrets hang off environments.
    EnvironmentId
);

// ═══════════════════════════════════════════════════════════════════════════════
// Actor
// ═══════════════════════════════════════════════════════════════════════════════

/// An authenticated user. An absent actor is modelled as `Option<Actor>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>) -> Self {
        Self { id: id.into() }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership level
// ═══════════════════════════════════════════════════════════════════════════════

/// Membership rank within an organization or project.
///
/// Ordered `Guest < Member < Manager < Owner`. "No membership" is
/// `Option::<Level>::None`, which orders below every level.
///
/// A guest holds no membership of their own in the organization but belongs to
/// one of its projects, or holds a `guest` membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Guest,
    Member,
    Manager,
    Owner,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Guest, Level::Member, Level::Manager, Level::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Guest => "guest",
            Level::Member => "member",
            Level::Manager => "manager",
            Level::Owner => "owner",
        }
    }

    /// Map a stored membership type to a level. Unrecognised types carry no level.
    pub fn from_membership_type(value: &str) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|level| value.trim().eq_ignore_ascii_case(level.as_str()))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = GatekeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::from_membership_type(s).ok_or_else(|| {
            GatekeeperError::invalid_input(format!("unknown membership level: {}", s.trim()))
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Visibility
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn from_public_flag(public: bool) -> Self {
        if public {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}
