//! Read-only membership and scope lookups the engine depends on.
//!
//! One store value is handed to one [`AuthzService`](crate::authz::AuthzService);
//! for PostgreSQL that means one transaction, so every lookup of a request sees
//! the same snapshot.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;

use crate::authz::{ActorId, EnvironmentId, Level, OrganizationId, ProjectId};
use crate::error::Result;

pub use memory::{InMemoryMembershipStore, QueryCounts};
pub use postgres::{connect, PgMembershipStore};

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// The actor's level in a non-archived organization, if they are a member.
    async fn organization_membership_for(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<Option<Level>>;

    /// The actor's level in a project, if they are a member.
    async fn project_membership_for(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Level>>;

    /// Whether the actor belongs to any live project of the organization. Such
    /// actors are guests of the organization.
    async fn has_project_membership_in(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool>;

    /// The organization owning a project.
    async fn organization_of_project(&self, project: &ProjectId) -> Result<Option<OrganizationId>>;

    /// Whether a project is published to anonymous visitors. Unknown projects are not.
    async fn project_is_public(&self, project: &ProjectId) -> Result<bool>;

    /// The project an environment belongs to.
    async fn project_of_environment(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<ProjectId>>;

    /// Whether the actor holds an open invitation to the project.
    async fn invited_to_project(&self, actor: &ActorId, project: &ProjectId) -> Result<bool>;

    /// Whether the actor holds an open invitation to any project of the organization.
    async fn invited_to_organization(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool>;

    /// Whether the actor has a block in effect right now.
    async fn actor_is_blocked(&self, actor: &ActorId) -> Result<bool>;
}

#[async_trait]
impl<T: MembershipStore + ?Sized> MembershipStore for &T {
    async fn organization_membership_for(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<Option<Level>> {
        (**self).organization_membership_for(actor, organization).await
    }

    async fn project_membership_for(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Level>> {
        (**self).project_membership_for(actor, project).await
    }

    async fn has_project_membership_in(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        (**self).has_project_membership_in(actor, organization).await
    }

    async fn organization_of_project(&self, project: &ProjectId) -> Result<Option<OrganizationId>> {
        (**self).organization_of_project(project).await
    }

    async fn project_is_public(&self, project: &ProjectId) -> Result<bool> {
        (**self).project_is_public(project).await
    }

    async fn project_of_environment(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<ProjectId>> {
        (**self).project_of_environment(environment).await
    }

    async fn invited_to_project(&self, actor: &ActorId, project: &ProjectId) -> Result<bool> {
        (**self).invited_to_project(actor, project).await
    }

    async fn invited_to_organization(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        (**self).invited_to_organization(actor, organization).await
    }

    async fn actor_is_blocked(&self, actor: &ActorId) -> Result<bool> {
        (**self).actor_is_blocked(actor).await
    }
}

#[async_trait]
impl<T: MembershipStore + ?Sized> MembershipStore for Arc<T> {
    async fn organization_membership_for(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<Option<Level>> {
        (**self).organization_membership_for(actor, organization).await
    }

    async fn project_membership_for(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Level>> {
        (**self).project_membership_for(actor, project).await
    }

    async fn has_project_membership_in(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        (**self).has_project_membership_in(actor, organization).await
    }

    async fn organization_of_project(&self, project: &ProjectId) -> Result<Option<OrganizationId>> {
        (**self).organization_of_project(project).await
    }

    async fn project_is_public(&self, project: &ProjectId) -> Result<bool> {
        (**self).project_is_public(project).await
    }

    async fn project_of_environment(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<ProjectId>> {
        (**self).project_of_environment(environment).await
    }

    async fn invited_to_project(&self, actor: &ActorId, project: &ProjectId) -> Result<bool> {
        (**self).invited_to_project(actor, project).await
    }

    async fn invited_to_organization(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        (**self).invited_to_organization(actor, organization).await
    }

    async fn actor_is_blocked(&self, actor: &ActorId) -> Result<bool> {
        (**self).actor_is_blocked(actor).await
    }
}
