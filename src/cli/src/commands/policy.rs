//! Policy table listing.

use anyhow::Result;
use clap::Args;
use gatekeeper_core::authz::{Kind, PolicyTable};
use serde::Serialize;
use tabled::Tabled;

use super::join_verbs;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct PolicyArgs {
    /// Only show rules for this kind
    #[arg(short, long)]
    kind: Option<Kind>,
}

#[derive(Debug, Serialize, Tabled)]
struct RuleRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Granted to")]
    grantee: String,
    #[tabled(rename = "Verbs")]
    verbs: String,
}

pub fn execute(args: PolicyArgs, format: OutputFormat) -> Result<()> {
    let table = PolicyTable::standard();
    let rows: Vec<RuleRow> = table
        .rules()
        .filter(|rule| args.kind.map_or(true, |kind| rule.kind == kind))
        .map(|rule| RuleRow {
            kind: rule.kind.to_string(),
            grantee: rule.grantee(),
            verbs: join_verbs(&rule.verbs),
        })
        .collect();

    if matches!(format, OutputFormat::Table) {
        output::print_header("Policy");
    }
    output::print_list(&rows, format)
}
