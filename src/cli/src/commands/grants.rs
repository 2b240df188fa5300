//! Verbs granted in a hypothetical context.

use anyhow::{bail, Result};
use clap::Args;
use gatekeeper_core::authz::{GrantContext, Kind, Level, PolicyTable, Visibility};
use serde::Serialize;

use super::join_verbs;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct GrantsArgs {
    /// Subject kind
    #[arg(short, long)]
    kind: Kind,

    /// Effective membership level of the actor
    #[arg(short, long)]
    level: Option<Level>,

    /// Treat the subject as public
    #[arg(long)]
    public: bool,

    /// The actor owns the subject
    #[arg(long)]
    owner: bool,

    /// The actor holds an open invitation to the subject's project or organization
    #[arg(long)]
    invited: bool,

    /// No actor at all
    #[arg(long)]
    anonymous: bool,
}

#[derive(Debug, Serialize)]
struct GrantsReport {
    kind: String,
    context: String,
    verbs: Vec<String>,
}

pub fn execute(args: GrantsArgs, format: OutputFormat) -> Result<()> {
    if args.anonymous && (args.level.is_some() || args.owner || args.invited) {
        bail!("--anonymous cannot be combined with --level, --owner or --invited");
    }

    let visibility = Visibility::from_public_flag(args.public);
    let context = if args.anonymous {
        GrantContext::anonymous(visibility)
    } else {
        GrantContext::authenticated(args.level, visibility, args.owner).with_invitation(args.invited)
    };
    let verbs = PolicyTable::standard().grants(args.kind, &context);

    let report = GrantsReport {
        kind: args.kind.to_string(),
        context: describe(&context),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
    };

    match format {
        OutputFormat::Table => {
            output::print_header("Grants");
            output::print_detail("Kind", &report.kind);
            output::print_detail("Context", &report.context);
            output::print_detail("Verbs", &join_verbs(&verbs));
            Ok(())
        }
        _ => output::print_item(&report, format),
    }
}

fn describe(context: &GrantContext) -> String {
    let mut parts = vec![if context.authenticated {
        "authenticated".to_string()
    } else {
        "anonymous".to_string()
    }];
    if let Some(level) = context.level {
        parts.push(level.to_string());
    }
    parts.push(match context.visibility {
        Visibility::Public => "public".to_string(),
        Visibility::Private => "private".to_string(),
    });
    if context.owner_match {
        parts.push("owner".to_string());
    }
    if context.invited {
        parts.push("invited".to_string());
    }
    parts.join(", ")
}
