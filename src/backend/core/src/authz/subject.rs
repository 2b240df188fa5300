//! The [`Subject`] trait implemented by everything that can be authorized.

use serde::{Deserialize, Serialize};

use super::model::{ActorId, EnvironmentId, OrganizationId, ProjectId, Visibility};

/// The ownership scope a subject reports about itself.
///
/// This is what the resource knows directly; the classifier turns it into a
/// resolved [`Scope`](super::classifier::Scope), following environment and
/// project links through the store where needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeRef {
    Unscoped,
    Organization(OrganizationId),
    Project {
        project: ProjectId,
        /// Known owning organization; looked up when absent.
        organization: Option<OrganizationId>,
    },
    Environment(EnvironmentId),
}

impl ScopeRef {
    pub fn project(project: ProjectId) -> Self {
        ScopeRef::Project {
            project,
            organization: None,
        }
    }
}

/// A resource under authorization.
///
/// `authorization_name` is the kind string ("project", "secret", ...). Names the
/// engine has no policy for are denied.
pub trait Subject: Send + Sync {
    fn authorization_name(&self) -> &str;

    fn scope(&self) -> ScopeRef {
        ScopeRef::Unscoped
    }

    fn visibility(&self) -> Visibility {
        Visibility::Private
    }

    /// The single actor an owner-only subject belongs to.
    fn owner(&self) -> Option<ActorId> {
        None
    }
}

impl<T: Subject + ?Sized> Subject for &T {
    fn authorization_name(&self) -> &str {
        (**self).authorization_name()
    }

    fn scope(&self) -> ScopeRef {
        (**self).scope()
    }

    fn visibility(&self) -> Visibility {
        (**self).visibility()
    }

    fn owner(&self) -> Option<ActorId> {
        (**self).owner()
    }
}

/// A subject described by plain data, for callers whose resource types live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDescriptor {
    pub kind: String,
    pub scope: ScopeRef,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub owner: Option<ActorId>,
}

impl SubjectDescriptor {
    pub fn new(kind: impl Into<String>, scope: ScopeRef) -> Self {
        Self {
            kind: kind.into(),
            scope,
            visibility: Visibility::Private,
            owner: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_owner(mut self, owner: ActorId) -> Self {
        self.owner = Some(owner);
        self
    }
}

impl Subject for SubjectDescriptor {
    fn authorization_name(&self) -> &str {
        &self.kind
    }

    fn scope(&self) -> ScopeRef {
        self.scope
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn owner(&self) -> Option<ActorId> {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_private_without_owner() {
        let subject = SubjectDescriptor::new("job", ScopeRef::project(ProjectId::random()));
        assert_eq!(subject.visibility(), Visibility::Private);
        assert_eq!(subject.owner(), None);
        assert_eq!(subject.authorization_name(), "job");
    }

    #[test]
    fn test_reference_forwards() {
        let owner = ActorId::random();
        let subject = SubjectDescriptor::new("session", ScopeRef::Unscoped).with_owner(owner);
        let by_ref: &dyn Subject = &subject;
        assert_eq!((&by_ref).owner(), Some(owner));
    }
}
