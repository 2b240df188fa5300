//! Gatekeeper CLI - inspect the authorization policy and try decisions.
//!
//! Provides commands to list the policy table, show grants for a context,
//! and run a full decision against an in-memory membership store.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gatekeeper_core::logging::{init_logging, LogFormat, LoggingConfig};

use commands::{check, grants, policy};
use output::OutputFormat;

/// Gatekeeper - authorization engine CLI
#[derive(Parser)]
#[command(
    name = "gatekeeper",
    version,
    about = "Gatekeeper - authorization policy inspection",
    long_about = "CLI tool for inspecting the capability policy and checking authorization decisions.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log level for engine diagnostics (overridden by RUST_LOG)
    #[arg(long, global = true, env = "GATEKEEPER_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the policy table
    Policy(policy::PolicyArgs),

    /// Show the verbs granted in a context
    Grants(grants::GrantsArgs),

    /// Run one decision through the engine
    Check(check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        format: LogFormat::Compact,
        ..LoggingConfig::default()
    })?;

    let format = cli.output;
    let result = match cli.command {
        Commands::Policy(args) => policy::execute(args, format),
        Commands::Grants(args) => grants::execute(args, format),
        Commands::Check(args) => check::execute(args, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
