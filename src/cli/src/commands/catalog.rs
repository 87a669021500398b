//! Offline catalog commands: roles, permissions, and the grant matrix.
//!
//! Answered from the compiled-in catalog; no server round trip.

use anyhow::Result;
use clap::Subcommand;
use orgauth_core::rbac::{Permission, Role};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List roles from highest to lowest
    Roles,

    /// List permission tokens
    Permissions {
        /// Only permissions granted to this role
        #[arg(short, long)]
        role: Option<Role>,
    },

    /// Show which role grants which permission
    Matrix,
}

// ── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Tabled)]
struct RoleRow {
    #[tabled(rename = "Role")]
    role: &'static str,
    #[tabled(rename = "Rank")]
    rank: u8,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Permissions")]
    permissions: usize,
    #[tabled(rename = "Description")]
    description: &'static str,
}

#[derive(Debug, Serialize, Tabled)]
struct PermissionRow {
    #[tabled(rename = "Token")]
    token: &'static str,
    #[tabled(rename = "Resource")]
    resource: &'static str,
    #[tabled(rename = "Action")]
    action: &'static str,
    #[tabled(rename = "Lowest Role")]
    lowest_role: &'static str,
}

#[derive(Debug, Serialize, Tabled)]
struct MatrixRow {
    #[tabled(rename = "Permission")]
    permission: &'static str,
    owner: &'static str,
    admin: &'static str,
    member: &'static str,
    viewer: &'static str,
}

fn role_rows() -> Vec<RoleRow> {
    Role::ALL
        .into_iter()
        .map(|role| RoleRow {
            role: role.as_str(),
            rank: role.rank(),
            name: role.name(),
            permissions: role.permissions().len(),
            description: role.description(),
        })
        .collect()
}

/// The lowest role holding `permission`. Grants are cumulative, so every role
/// above it holds it too.
fn lowest_role(permission: Permission) -> Option<Role> {
    Role::ALL
        .into_iter()
        .rev()
        .find(|role| role.permissions().contains(permission))
}

fn permission_rows(role: Option<Role>) -> Vec<PermissionRow> {
    Permission::ALL
        .into_iter()
        .filter(|p| role.map_or(true, |r| r.permissions().contains(*p)))
        .map(|p| PermissionRow {
            token: p.as_str(),
            resource: p.resource(),
            action: p.action(),
            lowest_role: lowest_role(p).map_or("-", Role::as_str),
        })
        .collect()
}

fn matrix_rows() -> Vec<MatrixRow> {
    let mark = |role: Role, p: Permission| if role.permissions().contains(p) { "yes" } else { "-" };
    Permission::ALL
        .into_iter()
        .map(|p| MatrixRow {
            permission: p.as_str(),
            owner: mark(Role::Owner, p),
            admin: mark(Role::Admin, p),
            member: mark(Role::Member, p),
            viewer: mark(Role::Viewer, p),
        })
        .collect()
}

pub async fn execute(cmd: CatalogCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        CatalogCommands::Roles => output::print_list(&role_rows(), format),
        CatalogCommands::Permissions { role } => output::print_list(&permission_rows(role), format),
        CatalogCommands::Matrix => output::print_list(&matrix_rows(), format),
    }
}
