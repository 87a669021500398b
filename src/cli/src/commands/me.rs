//! Show the caller's own membership and effective permissions.

use anyhow::Result;
use clap::Args;
use orgauth_core::rbac::{policy, render_if, Permission, PermissionSummary};
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct MeArgs {
    /// List every permission, including ones you do not hold
    #[arg(short, long)]
    all: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct GrantRow {
    #[tabled(rename = "Permission")]
    permission: &'static str,
    #[tabled(rename = "Granted")]
    granted: &'static str,
}

fn grant_rows(summary: &PermissionSummary, all: bool) -> Vec<GrantRow> {
    Permission::ALL
        .into_iter()
        .filter(|p| all || summary.can(*p))
        .map(|p| GrantRow {
            permission: p.as_str(),
            granted: if summary.can(p) { "yes" } else { "no" },
        })
        .collect()
}

/// Actions worth pointing out, decided by re-running the evaluator on the
/// reported context.
fn highlights(summary: &PermissionSummary) -> Vec<&'static str> {
    let ctx = summary.context();
    [
        (Permission::MemberInvite, "invite members"),
        (Permission::PostPublish, "publish posts"),
        (Permission::OrganizationUpdate, "edit organization settings"),
        (Permission::OrganizationTransfer, "transfer ownership"),
    ]
    .into_iter()
    .map(|(p, label)| render_if(policy::can_access(Some(&ctx), p), label, ""))
    .filter(|label| !label.is_empty())
    .collect()
}

pub async fn execute(
    args: MeArgs,
    client: &ApiClient,
    org: &str,
    format: OutputFormat,
) -> Result<()> {
    let summary: PermissionSummary = client
        .get(&ApiClient::org_path(org, "/me/permissions"))
        .await?;

    if format != OutputFormat::Table {
        return output::print_item(&summary, format);
    }

    output::print_header("Membership");
    output::print_detail("Organization", summary.organization_id.as_str());
    output::print_detail("User", summary.user_id.as_str());
    output::print_detail("Role", summary.role.as_str());
    output::print_detail("Status", &output::status_cell(&summary.status.to_string()));

    let manageable: Vec<&str> = summary.manageable_roles.iter().map(|r| r.as_str()).collect();
    output::print_detail(
        "Can manage",
        &if manageable.is_empty() { "-".to_string() } else { manageable.join(", ") },
    );

    let actions = highlights(&summary);
    if !actions.is_empty() {
        output::print_detail("Can", &actions.join(", "));
    }

    if summary.permissions.is_empty() {
        output::print_info("No permissions are in effect for this membership.");
        if !args.all {
            return Ok(());
        }
    }

    println!();
    output::print_list(&grant_rows(&summary, args.all), format)
}
