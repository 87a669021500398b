//! OrgAuth CLI - inspect and manage organization memberships.
//!
//! Provides commands for the role catalog, members, permission checks,
//! health, and configuration.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{catalog, check, config, health, me, members, require_org};
use output::OutputFormat;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// OrgAuth - organization-scoped role-based access control
#[derive(Parser)]
#[command(
    name = "orgauth",
    author = "Aezi <aezi.zhu@icloud.com>",
    version = "0.1.0",
    about = "OrgAuth - organization-scoped access control",
    long_about = "CLI tool for browsing the role catalog and managing organization memberships.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "ORGAUTH_API_URL")]
    api_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, global = true, env = "ORGAUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Organization to act on
    #[arg(long, global = true, env = "ORGAUTH_ORG")]
    org: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse roles and permissions (offline)
    #[command(subcommand)]
    Catalog(catalog::CatalogCommands),

    /// Membership management operations
    #[command(subcommand)]
    Members(members::MemberCommands),

    /// Show your membership and effective permissions
    Me(me::MeArgs),

    /// Check whether you hold one or more permissions
    Check(check::CheckArgs),

    /// Check system health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let stored = config::load_config();
    let api_url = cli
        .api_url
        .clone()
        .or_else(|| stored.get("api-url").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let token = cli
        .token
        .clone()
        .or_else(|| stored.get("token").map(str::to_string));
    let org = cli
        .org
        .clone()
        .or_else(|| stored.get("org").map(str::to_string));

    let client = client::ApiClient::new(&api_url, token)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Catalog(cmd) => catalog::execute(cmd, format).await,
        Commands::Members(cmd) => match require_org(org.as_deref()) {
            Ok(org) => members::execute(cmd, &client, org, format).await,
            Err(e) => Err(e),
        },
        Commands::Me(args) => match require_org(org.as_deref()) {
            Ok(org) => me::execute(args, &client, org, format).await,
            Err(e) => Err(e),
        },
        Commands::Check(args) => match require_org(org.as_deref()) {
            Ok(org) => check::execute(args, &client, org, format).await,
            Err(e) => Err(e),
        },
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
