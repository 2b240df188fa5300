//! Effective membership level for a scope, cached for one decision session.

use std::collections::HashMap;
use tracing::trace;

use super::classifier::Scope;
use super::model::{Actor, Level, OrganizationId, ProjectId};
use crate::error::Result;
use crate::store::MembershipStore;

/// Resolves an actor's level, caching every raw lookup.
///
/// The cache is keyed by scope id only: a resolver belongs to one service,
/// and a service to one actor.
#[derive(Debug, Default)]
pub struct MembershipResolver {
    organization_levels: HashMap<OrganizationId, Option<Level>>,
    project_levels: HashMap<ProjectId, Option<Level>>,
    project_organizations: HashMap<ProjectId, Option<OrganizationId>>,
    project_invitations: HashMap<ProjectId, bool>,
    organization_invitations: HashMap<OrganizationId, bool>,
}

impl MembershipResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The actor's effective level in `scope`.
    ///
    /// An absent actor has no level and causes no queries. For a project the
    /// level is the higher of the project membership and the membership in the
    /// project's organization. An actor without an organization membership who
    /// belongs to one of its projects is a guest of the organization.
    pub async fn level_for<S>(
        &mut self,
        store: &S,
        actor: Option<&Actor>,
        scope: &Scope,
    ) -> Result<Option<Level>>
    where
        S: MembershipStore + ?Sized,
    {
        let Some(actor) = actor else {
            return Ok(None);
        };

        match scope {
            Scope::None => Ok(None),
            Scope::Organization(organization) => {
                self.organization_level(store, actor, organization).await
            }
            Scope::Project {
                project,
                organization,
            } => {
                let project_level = self.project_level(store, actor, project).await?;
                let organization = match organization {
                    Some(organization) => Some(*organization),
                    None => self.organization_of(store, project).await?,
                };
                let organization_level = match organization {
                    Some(organization) => {
                        self.organization_level(store, actor, &organization).await?
                    }
                    None => None,
                };
                Ok(project_level.max(organization_level))
            }
        }
    }

    async fn organization_level<S>(
        &mut self,
        store: &S,
        actor: &Actor,
        organization: &OrganizationId,
    ) -> Result<Option<Level>>
    where
        S: MembershipStore + ?Sized,
    {
        if let Some(level) = self.organization_levels.get(organization) {
            return Ok(*level);
        }
        let level = match store
            .organization_membership_for(&actor.id, organization)
            .await?
        {
            Some(level) => Some(level),
            None => store
                .has_project_membership_in(&actor.id, organization)
                .await?
                .then_some(Level::Guest),
        };
        trace!(actor = %actor.id, organization = %organization, level = ?level, "Resolved organization membership");
        self.organization_levels.insert(*organization, level);
        Ok(level)
    }

    async fn project_level<S>(
        &mut self,
        store: &S,
        actor: &Actor,
        project: &ProjectId,
    ) -> Result<Option<Level>>
    where
        S: MembershipStore + ?Sized,
    {
        if let Some(level) = self.project_levels.get(project) {
            return Ok(*level);
        }
        let level = store.project_membership_for(&actor.id, project).await?;
        trace!(actor = %actor.id, project = %project, level = ?level, "Resolved project membership");
        self.project_levels.insert(*project, level);
        Ok(level)
    }

    /// Whether the actor holds an open invitation covering `scope`: the project
    /// itself, or any project of the organization.
    pub async fn invited_to<S>(
        &mut self,
        store: &S,
        actor: Option<&Actor>,
        scope: &Scope,
    ) -> Result<bool>
    where
        S: MembershipStore + ?Sized,
    {
        let Some(actor) = actor else {
            return Ok(false);
        };

        match scope {
            Scope::None => Ok(false),
            Scope::Organization(organization) => {
                if let Some(invited) = self.organization_invitations.get(organization) {
                    return Ok(*invited);
                }
                let invited = store
                    .invited_to_organization(&actor.id, organization)
                    .await?;
                self.organization_invitations.insert(*organization, invited);
                Ok(invited)
            }
            Scope::Project { project, .. } => {
                if let Some(invited) = self.project_invitations.get(project) {
                    return Ok(*invited);
                }
                let invited = store.invited_to_project(&actor.id, project).await?;
                self.project_invitations.insert(*project, invited);
                Ok(invited)
            }
        }
    }

    async fn organization_of<S>(
        &mut self,
        store: &S,
        project: &ProjectId,
    ) -> Result<Option<OrganizationId>>
    where
        S: MembershipStore + ?Sized,
    {
        if let Some(organization) = self.project_organizations.get(project) {
            return Ok(*organization);
        }
        let organization = store.organization_of_project(project).await?;
        self.project_organizations.insert(*project, organization);
        Ok(organization)
    }
}
