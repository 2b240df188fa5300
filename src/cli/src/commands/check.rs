//! Run one decision through the engine against an in-memory store.

use anyhow::{bail, Result};
use clap::Args;
use gatekeeper_core::authz::{
    Actor, ActorId, Authorizer, EnvironmentId, Kind, Level, OrganizationId, ProjectId, ScopeRef,
    ScopeShape, SubjectDescriptor, Verb, Visibility,
};
use gatekeeper_core::config::AuthzConfig;
use gatekeeper_core::store::InMemoryMembershipStore;
use gatekeeper_core::ErrorResponse;
use serde::Serialize;

use super::join_verbs;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// Subject kind
    #[arg(short, long)]
    kind: Kind,

    /// Verb to check, e.g. read, update, read-privileged
    #[arg(short, long)]
    verb: Verb,

    /// Actor's membership level in the subject's organization
    #[arg(long)]
    org_level: Option<Level>,

    /// Actor's membership level in the subject's project
    #[arg(long)]
    project_level: Option<Level>,

    /// Treat the subject as public
    #[arg(long)]
    public: bool,

    /// Make the subject's project public
    #[arg(long)]
    public_project: bool,

    /// The actor holds an open invitation to the subject's project
    #[arg(long)]
    invited: bool,

    /// The actor owns the subject
    #[arg(long)]
    owner: bool,

    /// No actor at all
    #[arg(long)]
    anonymous: bool,

    /// The actor has an active block
    #[arg(long)]
    blocked: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    kind: String,
    verb: String,
    allowed: bool,
    have: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<ErrorResponse>,
}

pub async fn execute(args: CheckArgs, format: OutputFormat) -> Result<()> {
    if args.anonymous
        && (args.org_level.is_some()
            || args.project_level.is_some()
            || args.owner
            || args.blocked
            || args.invited)
    {
        bail!("--anonymous cannot be combined with levels, --owner, --blocked or --invited");
    }

    let organization = OrganizationId::random();
    let project = ProjectId::random();
    let environment = EnvironmentId::random();
    let store = InMemoryMembershipStore::new()
        .with_project(project, organization)
        .with_environment(environment, project);
    store.set_project_public(project, args.public_project);

    let actor = (!args.anonymous).then(|| Actor::new(ActorId::random()));
    if let Some(actor) = &actor {
        if let Some(level) = args.org_level {
            store.add_organization_membership(actor.id, organization, level);
        }
        if let Some(level) = args.project_level {
            store.add_project_membership(actor.id, project, level);
        }
        if args.blocked {
            store.add_block(actor.id, chrono::Utc::now(), None);
        }
        if args.invited {
            store.add_invitation(actor.id, project);
        }
    }

    let scope = match args.kind.scope_shape() {
        ScopeShape::Unscoped => ScopeRef::Unscoped,
        ScopeShape::Organization => ScopeRef::Organization(organization),
        ScopeShape::Project => ScopeRef::Project {
            project,
            organization: Some(organization),
        },
        ScopeShape::Environment => ScopeRef::Environment(environment),
    };
    let mut subject = SubjectDescriptor::new(args.kind.as_str(), scope)
        .with_visibility(Visibility::from_public_flag(args.public));
    if let (true, Some(actor)) = (args.owner, &actor) {
        subject = subject.with_owner(actor.id);
    }

    let authorizer = Authorizer::standard(AuthzConfig::default())?;
    let mut authz = authorizer.service(&store, actor);
    let decision = authz.decide(args.verb.clone(), &subject).await;

    let report = CheckReport {
        kind: args.kind.to_string(),
        verb: args.verb.to_string(),
        allowed: decision.is_allowed(),
        have: decision.have_verbs().iter().map(|v| v.to_string()).collect(),
        status: decision.cause().map(|c| c.http_status().as_u16()),
        response: decision.cause().map(|c| c.to_response_body()),
    };

    match format {
        OutputFormat::Table => {
            output::print_header("Decision");
            output::print_detail("Kind", &report.kind);
            output::print_detail("Verb", &report.verb);
            output::print_detail("Have", &join_verbs(decision.have_verbs()));
            if let Some(status) = report.status {
                output::print_detail("Status", &status.to_string());
            }
            println!();
            if report.allowed {
                output::print_success(&format!("{} on {}", report.verb, report.kind));
            } else {
                output::print_denied(&format!("{} on {}", report.verb, report.kind));
                if let Some(response) = &report.response {
                    output::print_item(response, OutputFormat::Json)?;
                }
            }
            Ok(())
        }
        _ => output::print_item(&report, format),
    }
}
