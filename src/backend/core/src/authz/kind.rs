//! Registered subject kinds and the scope each kind lives in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GatekeeperError;

/// Where a kind hangs in the tenant tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeShape {
    /// Not inside any organization or project (sessions, users).
    Unscoped,
    /// Directly inside an organization.
    Organization,
    /// Inside a project, and through it an organization.
    Project,
    /// Inside an environment; the project is looked up.
    Environment,
}

/// Every kind the engine knows how to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    Organization,
    OrganizationMember,
    Project,
    ProjectMember,
    Job,
    Task,
    Environment,
    Secret,
    Webhook,
    NotificationRule,
    GitTrigger,
    Script,
    Schedule,
    Operation,
    Repository,
    Invitation,
    Session,
    User,
}

impl Kind {
    pub const ALL: [Kind; 18] = [
        Kind::Organization,
        Kind::OrganizationMember,
        Kind::Project,
        Kind::ProjectMember,
        Kind::Job,
        Kind::Task,
        Kind::Environment,
        Kind::Secret,
        Kind::Webhook,
        Kind::NotificationRule,
        Kind::GitTrigger,
        Kind::Script,
        Kind::Schedule,
        Kind::Operation,
        Kind::Repository,
        Kind::Invitation,
        Kind::Session,
        Kind::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Organization => "organization",
            Kind::OrganizationMember => "organization-member",
            Kind::Project => "project",
            Kind::ProjectMember => "project-member",
            Kind::Job => "job",
            Kind::Task => "task",
            Kind::Environment => "environment",
            Kind::Secret => "secret",
            Kind::Webhook => "webhook",
            Kind::NotificationRule => "notification-rule",
            Kind::GitTrigger => "git-trigger",
            Kind::Script => "script",
            Kind::Schedule => "schedule",
            Kind::Operation => "operation",
            Kind::Repository => "repository",
            Kind::Invitation => "invitation",
            Kind::Session => "session",
            Kind::User => "user",
        }
    }

    /// Plural relation name used in hypermedia links: `repository` → `repositories`.
    pub fn plural(&self) -> String {
        let name = self.as_str();
        match name.strip_suffix('y') {
            Some(stem) => format!("{}ies", stem),
            None => format!("{}s", name),
        }
    }

    pub fn scope_shape(&self) -> ScopeShape {
        match self {
            Kind::Session | Kind::User => ScopeShape::Unscoped,
            Kind::Organization | Kind::OrganizationMember => ScopeShape::Organization,
            Kind::Secret => ScopeShape::Environment,
            _ => ScopeShape::Project,
        }
    }

    /// Only tenants and projects can be published.
    pub fn may_be_public(&self) -> bool {
        matches!(self, Kind::Organization | Kind::Project)
    }

    /// Kinds that anonymous visitors of a public project may see. They take
    /// on the visibility of the project they live in.
    pub fn visible_through_project(&self) -> bool {
        matches!(
            self,
            Kind::ProjectMember
                | Kind::Job
                | Kind::Task
                | Kind::Environment
                | Kind::Webhook
                | Kind::NotificationRule
                | Kind::GitTrigger
                | Kind::Schedule
                | Kind::Operation
                | Kind::Repository
        )
    }

    /// Look up a registered kind by its authorization name.
    pub fn from_name(name: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = GatekeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::from_name(s)
            .ok_or_else(|| GatekeeperError::invalid_input(format!("unknown subject kind: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_every_kind() {
        for kind in Kind::ALL {
            assert_eq!(kind.as_str().parse::<Kind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_plural() {
        assert_eq!(Kind::Repository.plural(), "repositories");
        assert_eq!(Kind::Project.plural(), "projects");
        assert_eq!(Kind::NotificationRule.plural(), "notification-rules");
    }

    #[test]
    fn test_scope_shapes() {
        assert_eq!(Kind::Session.scope_shape(), ScopeShape::Unscoped);
        assert_eq!(Kind::Organization.scope_shape(), ScopeShape::Organization);
        assert_eq!(Kind::Job.scope_shape(), ScopeShape::Project);
        assert_eq!(Kind::Secret.scope_shape(), ScopeShape::Environment);
    }

    #[test]
    fn test_unknown_kind() {
        assert!("billing-plan".parse::<Kind>().is_err());
        assert_eq!(Kind::from_name("billing-plan"), None);
        assert_eq!(Kind::from_name("git-trigger"), Some(Kind::GitTrigger));
    }

    #[test]
    fn test_visible_through_project() {
        assert!(Kind::Job.visible_through_project());
        assert!(Kind::ProjectMember.visible_through_project());
        assert!(!Kind::Secret.visible_through_project());
        assert!(!Kind::Script.visible_through_project());
        assert!(!Kind::Invitation.visible_through_project());
        assert!(!Kind::Project.visible_through_project());
    }
}
