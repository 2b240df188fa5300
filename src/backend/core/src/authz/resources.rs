//! Subject implementations for the platform's resource types.
//!
//! These carry only the fields authorization needs; handlers build them from
//! whatever they loaded.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::Kind;
use super::model::{ActorId, EnvironmentId, OrganizationId, ProjectId, Visibility};
use super::subject::{ScopeRef, Subject};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub public: bool,
}

impl Subject for Organization {
    fn authorization_name(&self) -> &str {
        Kind::Organization.as_str()
    }

    fn scope(&self) -> ScopeRef {
        ScopeRef::Organization(self.id)
    }

    fn visibility(&self) -> Visibility {
        Visibility::from_public_flag(self.public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    pub public: bool,
}

impl Project {
    /// A project about to be created inside `organization_id`.
    pub fn new_in(organization_id: OrganizationId) -> Self {
        Self {
            id: ProjectId::random(),
            organization_id,
            public: false,
        }
    }
}

impl Subject for Project {
    fn authorization_name(&self) -> &str {
        Kind::Project.as_str()
    }

    fn scope(&self) -> ScopeRef {
        ScopeRef::Project {
            project: self.id,
            organization: Some(self.organization_id),
        }
    }

    fn visibility(&self) -> Visibility {
        Visibility::from_public_flag(self.public)
    }
}

macro_rules! project_resource {
    ($(#[$meta:meta])* $name:ident, $id:ty, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub id: $id,
            pub project_id: ProjectId,
        }

        impl Subject for $name {
            fn authorization_name(&self) -> &str {
                $kind.as_str()
            }

            fn scope(&self) -> ScopeRef {
                ScopeRef::project(self.project_id)
            }
        }
    };
}

project_resource!(Job, Uuid, Kind::Job);
project_resource!(Task, Uuid, Kind::Task);
project_resource!(Environment, EnvironmentId, Kind::Environment);
project_resource!(Webhook, Uuid, Kind::Webhook);
project_resource!(NotificationRule, Uuid, Kind::NotificationRule);
project_resource!(GitTrigger, Uuid, Kind::GitTrigger);
project_resource!(Script, Uuid, Kind::Script);
project_resource!(Schedule, Uuid, Kind::Schedule);
project_resource!(
    /// A run of a job; operations can be cancelled by any project member.
    Operation,
    Uuid,
    Kind::Operation
);
project_resource!(Repository, Uuid, Kind::Repository);

/// Secrets know only their environment; the project is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub id: Uuid,
    pub environment_id: EnvironmentId,
}

impl Subject for Secret {
    fn authorization_name(&self) -> &str {
        Kind::Secret.as_str()
    }

    fn scope(&self) -> ScopeRef {
        ScopeRef::Environment(self.environment_id)
    }
}

/// A login session, visible only to the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: ActorId,
}

impl Subject for Session {
    fn authorization_name(&self) -> &str {
        Kind::Session.as_str()
    }

    fn owner(&self) -> Option<ActorId> {
        Some(self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: ActorId,
}

impl Subject for User {
    fn authorization_name(&self) -> &str {
        Kind::User.as_str()
    }

    fn owner(&self) -> Option<ActorId> {
        Some(self.id)
    }
}

/// An invitation into a project. The invitee owns it once it is addressed to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: OrganizationId,
    pub project_id: ProjectId,
    pub invitee_id: Option<ActorId>,
    pub creator_id: ActorId,
}

impl Subject for Invitation {
    fn authorization_name(&self) -> &str {
        Kind::Invitation.as_str()
    }

    fn scope(&self) -> ScopeRef {
        ScopeRef::Project {
            project: self.project_id,
            organization: Some(self.organization_id),
        }
    }

    fn owner(&self) -> Option<ActorId> {
        self.invitee_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: ProjectId,
    pub user_id: ActorId,
}

impl Subject for ProjectMember {
    fn authorization_name(&self) -> &str {
        Kind::ProjectMember.as_str()
    }

    fn scope(&self) -> ScopeRef {
        ScopeRef::project(self.project_id)
    }

    fn owner(&self) -> Option<ActorId> {
        Some(self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub organization_id: OrganizationId,
    pub user_id: ActorId,
}

impl Subject for OrganizationMember {
    fn authorization_name(&self) -> &str {
        Kind::OrganizationMember.as_str()
    }

    fn scope(&self) -> ScopeRef {
        ScopeRef::Organization(self.organization_id)
    }

    fn owner(&self) -> Option<ActorId> {
        Some(self.user_id)
    }
}
