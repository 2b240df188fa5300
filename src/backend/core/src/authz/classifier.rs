//! Subject classification: kind, resolved scope, visibility and owner.

use std::collections::HashMap;
use tracing::{error, warn};

use super::kind::{Kind, ScopeShape};
use super::model::{ActorId, EnvironmentId, OrganizationId, ProjectId, Visibility};
use super::subject::{ScopeRef, Subject};
use crate::error::{ErrorCode, GatekeeperError, Result};
use crate::store::MembershipStore;

/// The resolved scope a subject's memberships are looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// No organization or project applies.
    None,
    Organization(OrganizationId),
    Project {
        project: ProjectId,
        organization: Option<OrganizationId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: Kind,
    pub scope: Scope,
    pub visibility: Visibility,
    pub owner: Option<ActorId>,
}

/// Classifies subjects for one decision session, caching environment lookups.
#[derive(Debug, Default)]
pub struct Classifier {
    environment_projects: HashMap<EnvironmentId, Option<ProjectId>>,
    project_visibilities: HashMap<ProjectId, Visibility>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a subject.
    ///
    /// # Errors
    ///
    /// `no_authorization_defined` for an unregistered kind or a scope that does not
    /// fit the kind; store errors when a transitive lookup fails.
    pub async fn classify<S, T>(&mut self, store: &S, subject: &T) -> Result<Classification>
    where
        S: MembershipStore + ?Sized,
        T: Subject + ?Sized,
    {
        let name = subject.authorization_name();
        let kind =
            Kind::from_name(name).ok_or_else(|| unclassifiable(name, "kind is not registered"))?;

        let scope = match (kind.scope_shape(), subject.scope()) {
            (ScopeShape::Unscoped, ScopeRef::Unscoped) => Scope::None,
            (ScopeShape::Organization, ScopeRef::Organization(organization)) => {
                Scope::Organization(organization)
            }
            (
                ScopeShape::Project,
                ScopeRef::Project {
                    project,
                    organization,
                },
            ) => Scope::Project {
                project,
                organization,
            },
            (ScopeShape::Environment, ScopeRef::Environment(environment)) => {
                match self.project_of_environment(store, &environment).await? {
                    Some(project) => Scope::Project {
                        project,
                        organization: None,
                    },
                    None => {
                        warn!(kind = %kind, environment = %environment, "Environment not found, classifying without scope");
                        Scope::None
                    }
                }
            }
            (_, other) => {
                return Err(unclassifiable(
                    name,
                    &format!("scope {:?} does not fit kind", other),
                ))
            }
        };

        let visibility = match subject.visibility() {
            Visibility::Public if !kind.may_be_public() => {
                warn!(kind = %kind, "Subject claims public visibility its kind cannot have");
                Visibility::Private
            }
            visibility => visibility,
        };

        Ok(Classification {
            kind,
            scope,
            visibility,
            owner: subject.owner(),
        })
    }

    /// Visibility of the project a subject lives in, for kinds anyone may read
    /// through a public project. Returns the classification unchanged otherwise.
    pub async fn through_project<S>(
        &mut self,
        store: &S,
        classification: Classification,
    ) -> Result<Classification>
    where
        S: MembershipStore + ?Sized,
    {
        let project = match classification.scope {
            Scope::Project { project, .. } if classification.kind.visible_through_project() => {
                project
            }
            _ => return Ok(classification),
        };
        let visibility = match self.project_visibilities.get(&project) {
            Some(visibility) => *visibility,
            None => {
                let visibility = if store.project_is_public(&project).await? {
                    Visibility::Public
                } else {
                    Visibility::Private
                };
                self.project_visibilities.insert(project, visibility);
                visibility
            }
        };
        Ok(Classification {
            visibility,
            ..classification
        })
    }

    async fn project_of_environment<S>(
        &mut self,
        store: &S,
        environment: &EnvironmentId,
    ) -> Result<Option<ProjectId>>
    where
        S: MembershipStore + ?Sized,
    {
        if let Some(project) = self.environment_projects.get(environment) {
            return Ok(*project);
        }
        let project = store.project_of_environment(environment).await?;
        self.environment_projects.insert(*environment, project);
        Ok(project)
    }
}

fn unclassifiable(name: &str, problem: &str) -> GatekeeperError {
    error!(subject = name, problem, "Cannot classify subject for authorization");
    GatekeeperError::with_internal(
        ErrorCode::NoAuthorizationDefined,
        "No authorization is defined for this resource",
        format!("{}: {}", name, problem),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::resources::{Job, Organization, Project, Secret, Session};
    use crate::authz::subject::SubjectDescriptor;
    use crate::store::InMemoryMembershipStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_project_keeps_organization_and_visibility() {
        let store = InMemoryMembershipStore::new();
        let org = OrganizationId::random();
        let project = Project {
            id: ProjectId::random(),
            organization_id: org,
            public: true,
        };

        let c = Classifier::new().classify(&store, &project).await.unwrap();
        assert_eq!(c.kind, Kind::Project);
        assert_eq!(
            c.scope,
            Scope::Project {
                project: project.id,
                organization: Some(org)
            }
        );
        assert_eq!(c.visibility, Visibility::Public);
        assert_eq!(store.query_counts().total(), 0);
    }

    #[tokio::test]
    async fn test_organization_scope() {
        let store = InMemoryMembershipStore::new();
        let org = Organization {
            id: OrganizationId::random(),
            public: false,
        };
        let c = Classifier::new().classify(&store, &org).await.unwrap();
        assert_eq!(c.scope, Scope::Organization(org.id));
        assert_eq!(c.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn test_secret_resolves_project_once() {
        let environment = EnvironmentId::random();
        let project = ProjectId::random();
        let store = InMemoryMembershipStore::new().with_environment(environment, project);
        let mut classifier = Classifier::new();

        for _ in 0..3 {
            let secret = Secret {
                id: Uuid::new_v4(),
                environment_id: environment,
            };
            let c = classifier.classify(&store, &secret).await.unwrap();
            assert_eq!(
                c.scope,
                Scope::Project {
                    project,
                    organization: None
                }
            );
        }
        assert_eq!(store.query_counts().environment_projects, 1);
    }

    #[tokio::test]
    async fn test_secret_without_environment_has_no_scope() {
        let store = InMemoryMembershipStore::new();
        let secret = Secret {
            id: Uuid::new_v4(),
            environment_id: EnvironmentId::random(),
        };
        let c = Classifier::new().classify(&store, &secret).await.unwrap();
        assert_eq!(c.scope, Scope::None);
    }

    #[tokio::test]
    async fn test_session_owner() {
        let store = InMemoryMembershipStore::new();
        let owner = ActorId::random();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: owner,
        };
        let c = Classifier::new().classify(&store, &session).await.unwrap();
        assert_eq!(c.scope, Scope::None);
        assert_eq!(c.owner, Some(owner));
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_closed() {
        let store = InMemoryMembershipStore::new();
        let subject = SubjectDescriptor::new("billing-plan", ScopeRef::Unscoped);
        let err = Classifier::new().classify(&store, &subject).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoAuthorizationDefined);
    }

    #[tokio::test]
    async fn test_scope_mismatch_fails_closed() {
        let store = InMemoryMembershipStore::new();
        let subject = SubjectDescriptor::new("job", ScopeRef::Unscoped);
        let err = Classifier::new().classify(&store, &subject).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoAuthorizationDefined);
    }

    #[tokio::test]
    async fn test_public_claim_downgraded_for_private_only_kind() {
        let store = InMemoryMembershipStore::new();
        let job = Job {
            id: Uuid::new_v4(),
            project_id: ProjectId::random(),
        };
        let subject = SubjectDescriptor::new("job", job.scope()).with_visibility(Visibility::Public);
        let c = Classifier::new().classify(&store, &subject).await.unwrap();
        assert_eq!(c.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn test_job_takes_visibility_of_public_project() {
        let org = OrganizationId::random();
        let public = ProjectId::random();
        let private = ProjectId::random();
        let store = InMemoryMembershipStore::new()
            .with_public_project(public, org)
            .with_project(private, org);
        let mut classifier = Classifier::new();

        for _ in 0..2 {
            let job = Job {
                id: Uuid::new_v4(),
                project_id: public,
            };
            let c = classifier.classify(&store, &job).await.unwrap();
            let c = classifier.through_project(&store, c).await.unwrap();
            assert_eq!(c.visibility, Visibility::Public);
        }
        assert_eq!(store.query_counts().project_visibilities, 1);

        let job = Job {
            id: Uuid::new_v4(),
            project_id: private,
        };
        let c = classifier.classify(&store, &job).await.unwrap();
        let c = classifier.through_project(&store, c).await.unwrap();
        assert_eq!(c.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn test_secret_stays_private_in_public_project() {
        let environment = EnvironmentId::random();
        let project = ProjectId::random();
        let store = InMemoryMembershipStore::new()
            .with_public_project(project, OrganizationId::random())
            .with_environment(environment, project);
        let mut classifier = Classifier::new();
        let secret = Secret {
            id: Uuid::new_v4(),
            environment_id: environment,
        };
        let c = classifier.classify(&store, &secret).await.unwrap();
        let c = classifier.through_project(&store, c).await.unwrap();
        assert_eq!(c.visibility, Visibility::Private);
        assert_eq!(store.query_counts().project_visibilities, 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let store = InMemoryMembershipStore::new();
        store.set_failing(true);
        let secret = Secret {
            id: Uuid::new_v4(),
            environment_id: EnvironmentId::random(),
        };
        let err = Classifier::new().classify(&store, &secret).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
    }
}
