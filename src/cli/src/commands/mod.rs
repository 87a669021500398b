//! Subcommand implementations.

pub mod catalog;
pub mod check;
pub mod config;
pub mod health;
pub mod me;
pub mod members;

use anyhow::{Context, Result};

/// The organization a command acts on.
pub fn require_org(org: Option<&str>) -> Result<&str> {
    org.filter(|o| !o.trim().is_empty()).context(
        "No organization given; pass --org or run `orgauth config set org <id>`",
    )
}
