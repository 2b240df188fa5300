//! PostgreSQL membership store.
//!
//! Wraps a single transaction so that the classifier's transitive lookups and
//! the resolver's membership queries all read the same snapshot.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::MembershipStore;
use crate::authz::{ActorId, EnvironmentId, Level, OrganizationId, ProjectId};
use crate::config::DatabaseConfig;
use crate::error::Result;

/// Create a connection pool from configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await?;

    Ok(pool)
}

pub struct PgMembershipStore {
    tx: Mutex<Transaction<'static, Postgres>>,
}

impl PgMembershipStore {
    /// Open a transaction for one request.
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        Ok(Self::new(pool.begin().await?))
    }

    /// Use a transaction the caller already opened.
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    /// Hand the transaction back, e.g. to keep writing in it.
    pub fn into_transaction(self) -> Transaction<'static, Postgres> {
        self.tx.into_inner()
    }

    pub async fn commit(self) -> Result<()> {
        self.into_transaction().commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.into_transaction().rollback().await?;
        Ok(())
    }
}

/// Highest level among the returned membership rows; unknown types count as none.
fn highest_level(types: Vec<String>) -> Option<Level> {
    types
        .iter()
        .filter_map(|t| Level::from_membership_type(t))
        .max()
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn organization_membership_for(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<Option<Level>> {
        let mut tx = self.tx.lock().await;
        let types: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT organization_memberships.type::text
            FROM organization_memberships
            JOIN organizations ON organizations.uuid = organization_memberships.organization_uuid
            WHERE organization_memberships.organization_uuid = $1
              AND organization_memberships.user_uuid = $2
              AND organizations.archived_at IS NULL
            "#,
        )
        .bind(organization.0)
        .bind(actor.0)
        .fetch_all(&mut **tx)
        .await?;

        debug!(actor = %actor, organization = %organization, rows = types.len(), "Loaded organization membership");
        Ok(highest_level(types))
    }

    async fn project_membership_for(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Level>> {
        let mut tx = self.tx.lock().await;
        let types: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT membership_type::text
            FROM project_memberships
            WHERE project_uuid = $1
              AND user_uuid = $2
              AND archived_at IS NULL
            "#,
        )
        .bind(project.0)
        .bind(actor.0)
        .fetch_all(&mut **tx)
        .await?;

        debug!(actor = %actor, project = %project, rows = types.len(), "Loaded project membership");
        Ok(highest_level(types))
    }

    async fn has_project_membership_in(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        let mut tx = self.tx.lock().await;
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM project_memberships
                JOIN projects ON projects.uuid = project_memberships.project_uuid
                WHERE projects.organization_uuid = $1
                  AND project_memberships.user_uuid = $2
                  AND project_memberships.archived_at IS NULL
                  AND projects.archived_at IS NULL
            )
            "#,
        )
        .bind(organization.0)
        .bind(actor.0)
        .fetch_one(&mut **tx)
        .await?;

        Ok(found)
    }

    async fn organization_of_project(&self, project: &ProjectId) -> Result<Option<OrganizationId>> {
        let mut tx = self.tx.lock().await;
        let organization: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT organization_uuid
            FROM projects
            WHERE uuid = $1
              AND archived_at IS NULL
            "#,
        )
        .bind(project.0)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(organization.map(OrganizationId))
    }

    async fn project_is_public(&self, project: &ProjectId) -> Result<bool> {
        let mut tx = self.tx.lock().await;
        let public: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT public
            FROM projects
            WHERE uuid = $1
              AND archived_at IS NULL
            "#,
        )
        .bind(project.0)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(public.unwrap_or(false))
    }

    async fn project_of_environment(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<ProjectId>> {
        let mut tx = self.tx.lock().await;
        let project: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT project_uuid
            FROM environments
            WHERE uuid = $1
              AND archived_at IS NULL
            "#,
        )
        .bind(environment.0)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(project.map(ProjectId))
    }

    async fn invited_to_project(&self, actor: &ActorId, project: &ProjectId) -> Result<bool> {
        let mut tx = self.tx.lock().await;
        let invited: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE invitee_uuid = $1
                  AND project_uuid = $2
                  AND archived_at IS NULL
            )
            "#,
        )
        .bind(actor.0)
        .bind(project.0)
        .fetch_one(&mut **tx)
        .await?;

        Ok(invited)
    }

    async fn invited_to_organization(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        let mut tx = self.tx.lock().await;
        let invited: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE invitee_uuid = $1
                  AND organization_uuid = $2
                  AND archived_at IS NULL
            )
            "#,
        )
        .bind(actor.0)
        .bind(organization.0)
        .fetch_one(&mut **tx)
        .await?;

        Ok(invited)
    }

    async fn actor_is_blocked(&self, actor: &ActorId) -> Result<bool> {
        let mut tx = self.tx.lock().await;
        let blocked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_blocks
                WHERE user_uuid = $1
                  AND valid @> NOW()
            )
            "#,
        )
        .bind(actor.0)
        .fetch_one(&mut **tx)
        .await?;

        Ok(blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_level() {
        assert_eq!(
            highest_level(vec!["guest".into(), "member".into(), "manager".into()]),
            Some(Level::Manager)
        );
        assert_eq!(highest_level(vec!["guest".into()]), Some(Level::Guest));
        assert_eq!(highest_level(vec!["auditor".into()]), None);
        assert_eq!(highest_level(Vec::new()), None);
    }
}
