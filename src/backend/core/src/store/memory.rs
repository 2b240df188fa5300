//! In-memory membership store.
//!
//! Backs tests, benchmarks and the CLI. Every lookup is counted so callers can
//! verify how many queries a batch of decisions issued.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::MembershipStore;
use crate::authz::{ActorId, EnvironmentId, Level, OrganizationId, ProjectId};
use crate::error::{GatekeeperError, Result};

/// Snapshot of how many lookups a store has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounts {
    pub organization_memberships: usize,
    pub project_memberships: usize,
    /// "Member of any project in this organization?" checks.
    pub organization_guests: usize,
    pub project_organizations: usize,
    pub project_visibilities: usize,
    pub environment_projects: usize,
    pub invitations: usize,
    pub blocks: usize,
}

impl QueryCounts {
    /// Membership lookups only.
    pub fn memberships(&self) -> usize {
        self.organization_memberships + self.project_memberships + self.organization_guests
    }

    pub fn total(&self) -> usize {
        self.memberships()
            + self.project_organizations
            + self.project_visibilities
            + self.environment_projects
            + self.invitations
            + self.blocks
    }
}

#[derive(Debug, Clone)]
struct Block {
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
}

impl Block {
    fn active_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_until.map_or(true, |until| at < until)
    }
}

#[derive(Debug, Default)]
struct Tables {
    organization_memberships: HashMap<(ActorId, OrganizationId), Level>,
    project_memberships: HashMap<(ActorId, ProjectId), Level>,
    projects: HashMap<ProjectId, OrganizationId>,
    public_projects: HashSet<ProjectId>,
    environments: HashMap<EnvironmentId, ProjectId>,
    invitations: HashSet<(ActorId, ProjectId)>,
    blocks: HashMap<ActorId, Vec<Block>>,
}

#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    tables: RwLock<Tables>,
    organization_membership_queries: AtomicUsize,
    project_membership_queries: AtomicUsize,
    organization_guest_queries: AtomicUsize,
    project_organization_queries: AtomicUsize,
    project_visibility_queries: AtomicUsize,
    environment_project_queries: AtomicUsize,
    invitation_queries: AtomicUsize,
    block_queries: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builders
    // ─────────────────────────────────────────────────────────────────────────

    pub fn with_project(self, project: ProjectId, organization: OrganizationId) -> Self {
        self.add_project(project, organization);
        self
    }

    /// A project anonymous visitors may browse.
    pub fn with_public_project(self, project: ProjectId, organization: OrganizationId) -> Self {
        self.add_project(project, organization);
        self.set_project_public(project, true);
        self
    }

    pub fn with_environment(self, environment: EnvironmentId, project: ProjectId) -> Self {
        self.add_environment(environment, project);
        self
    }

    /// An open invitation for `actor` to join `project`.
    pub fn with_invitation(self, actor: ActorId, project: ProjectId) -> Self {
        self.add_invitation(actor, project);
        self
    }

    pub fn with_organization_membership(
        self,
        actor: ActorId,
        organization: OrganizationId,
        level: Level,
    ) -> Self {
        self.add_organization_membership(actor, organization, level);
        self
    }

    pub fn with_project_membership(self, actor: ActorId, project: ProjectId, level: Level) -> Self {
        self.add_project_membership(actor, project, level);
        self
    }

    /// Block an actor from now on, until `until` if given.
    pub fn with_block(self, actor: ActorId, until: Option<DateTime<Utc>>) -> Self {
        self.add_block(actor, Utc::now(), until);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_project(&self, project: ProjectId, organization: OrganizationId) {
        self.tables.write().projects.insert(project, organization);
    }

    pub fn set_project_public(&self, project: ProjectId, public: bool) {
        let mut tables = self.tables.write();
        if public {
            tables.public_projects.insert(project);
        } else {
            tables.public_projects.remove(&project);
        }
    }

    pub fn add_environment(&self, environment: EnvironmentId, project: ProjectId) {
        self.tables.write().environments.insert(environment, project);
    }

    pub fn add_invitation(&self, actor: ActorId, project: ProjectId) {
        self.tables.write().invitations.insert((actor, project));
    }

    pub fn add_organization_membership(
        &self,
        actor: ActorId,
        organization: OrganizationId,
        level: Level,
    ) {
        self.tables
            .write()
            .organization_memberships
            .insert((actor, organization), level);
    }

    pub fn add_project_membership(&self, actor: ActorId, project: ProjectId, level: Level) {
        self.tables
            .write()
            .project_memberships
            .insert((actor, project), level);
    }

    pub fn remove_project_membership(&self, actor: &ActorId, project: &ProjectId) {
        self.tables
            .write()
            .project_memberships
            .remove(&(*actor, *project));
    }

    pub fn add_block(
        &self,
        actor: ActorId,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) {
        self.tables
            .write()
            .blocks
            .entry(actor)
            .or_default()
            .push(Block {
                valid_from,
                valid_until,
            });
    }

    /// Make every subsequent lookup fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn query_counts(&self) -> QueryCounts {
        QueryCounts {
            organization_memberships: self.organization_membership_queries.load(Ordering::SeqCst),
            project_memberships: self.project_membership_queries.load(Ordering::SeqCst),
            organization_guests: self.organization_guest_queries.load(Ordering::SeqCst),
            project_organizations: self.project_organization_queries.load(Ordering::SeqCst),
            project_visibilities: self.project_visibility_queries.load(Ordering::SeqCst),
            environment_projects: self.environment_project_queries.load(Ordering::SeqCst),
            invitations: self.invitation_queries.load(Ordering::SeqCst),
            blocks: self.block_queries.load(Ordering::SeqCst),
        }
    }

    fn record(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatekeeperError::database("in-memory store set to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn organization_membership_for(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<Option<Level>> {
        self.record(&self.organization_membership_queries)?;
        Ok(self
            .tables
            .read()
            .organization_memberships
            .get(&(*actor, *organization))
            .copied())
    }

    async fn project_membership_for(
        &self,
        actor: &ActorId,
        project: &ProjectId,
    ) -> Result<Option<Level>> {
        self.record(&self.project_membership_queries)?;
        Ok(self
            .tables
            .read()
            .project_memberships
            .get(&(*actor, *project))
            .copied())
    }

    async fn has_project_membership_in(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        self.record(&self.organization_guest_queries)?;
        let tables = self.tables.read();
        Ok(tables.project_memberships.keys().any(|(member, project)| {
            member == actor && tables.projects.get(project) == Some(organization)
        }))
    }

    async fn organization_of_project(&self, project: &ProjectId) -> Result<Option<OrganizationId>> {
        self.record(&self.project_organization_queries)?;
        Ok(self.tables.read().projects.get(project).copied())
    }

    async fn project_is_public(&self, project: &ProjectId) -> Result<bool> {
        self.record(&self.project_visibility_queries)?;
        Ok(self.tables.read().public_projects.contains(project))
    }

    async fn project_of_environment(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<ProjectId>> {
        self.record(&self.environment_project_queries)?;
        Ok(self.tables.read().environments.get(environment).copied())
    }

    async fn invited_to_project(&self, actor: &ActorId, project: &ProjectId) -> Result<bool> {
        self.record(&self.invitation_queries)?;
        Ok(self.tables.read().invitations.contains(&(*actor, *project)))
    }

    async fn invited_to_organization(
        &self,
        actor: &ActorId,
        organization: &OrganizationId,
    ) -> Result<bool> {
        self.record(&self.invitation_queries)?;
        let tables = self.tables.read();
        Ok(tables.invitations.iter().any(|(invitee, project)| {
            invitee == actor && tables.projects.get(project) == Some(organization)
        }))
    }

    async fn actor_is_blocked(&self, actor: &ActorId) -> Result<bool> {
        self.record(&self.block_queries)?;
        let now = Utc::now();
        Ok(self
            .tables
            .read()
            .blocks
            .get(actor)
            .map_or(false, |blocks| blocks.iter().any(|b| b.active_at(now))))
    }
}
