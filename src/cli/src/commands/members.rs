//! Member management commands.
//!
//! Every command is checked by the server; the CLI only validates role
//! tokens locally so typos fail before a round trip.

use anyhow::Result;
use clap::Subcommand;
use orgauth_core::api::handlers::{
    InviteMemberRequest, TransferOwnershipRequest, TransferOwnershipResponse, UpdateRoleRequest,
};
use orgauth_core::rbac::{MembershipRecord, Role};
use reqwest::Method;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum MemberCommands {
    /// List members of the organization
    List,

    /// Invite a user with a role below your own
    Invite {
        /// User ID to invite
        user_id: String,

        /// Role to grant on acceptance
        #[arg(short, long, default_value = "member")]
        role: Role,
    },

    /// Accept your pending invitation
    Accept,

    /// Leave the organization
    Leave {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Change a member's role
    Role {
        /// User ID
        user_id: String,

        /// New role
        role: Role,
    },

    /// Suspend an active member
    Suspend {
        /// User ID
        user_id: String,
    },

    /// Reactivate a suspended member
    Reactivate {
        /// User ID
        user_id: String,
    },

    /// Remove a member
    Remove {
        /// User ID
        user_id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Transfer ownership to another active member
    Transfer {
        /// User ID of the new owner
        user_id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

// ── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Tabled)]
struct MemberRow {
    #[tabled(rename = "User")]
    user_id: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Invited By")]
    invited_by: String,
    #[tabled(rename = "Since")]
    since: String,
}

impl MemberRow {
    fn from_record(record: &MembershipRecord, colored: bool) -> Self {
        let status = record.status.to_string();
        Self {
            user_id: record.user_id.to_string(),
            role: record.role.to_string(),
            status: if colored { output::status_cell(&status) } else { status },
            invited_by: record
                .invited_by
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            since: record.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

fn print_record(record: &MembershipRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => output::print_list(&[MemberRow::from_record(record, true)], format),
        _ => output::print_item(record, format),
    }
}

fn confirm_needed(force: bool, what: &str) -> bool {
    if !force {
        output::print_info(&format!("This will {}. Use --force to confirm.", what));
    }
    !force
}

pub async fn execute(
    cmd: MemberCommands,
    client: &ApiClient,
    org: &str,
    format: OutputFormat,
) -> Result<()> {
    let members = ApiClient::org_path(org, "/members");

    match cmd {
        MemberCommands::List => {
            let records: Vec<MembershipRecord> = client.get(&members).await?;
            match format {
                OutputFormat::Table => {
                    let rows: Vec<MemberRow> =
                        records.iter().map(|r| MemberRow::from_record(r, true)).collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&records, format)?,
            }
        }

        MemberCommands::Invite { user_id, role } => {
            let body = InviteMemberRequest {
                user_id,
                role: role.as_str().to_string(),
            };
            let record: MembershipRecord = client.post(&members, &body).await?;
            if format == OutputFormat::Table {
                output::print_success(&format!("Invited {} as {}", record.user_id, record.role));
            }
            print_record(&record, format)?;
        }

        MemberCommands::Accept => {
            let record: MembershipRecord =
                client.post_empty(&format!("{}/accept", members)).await?;
            if format == OutputFormat::Table {
                output::print_success(&format!("Joined {} as {}", org, record.role));
            } else {
                print_record(&record, format)?;
            }
        }

        MemberCommands::Leave { force } => {
            if confirm_needed(force, &format!("remove you from {}", org)) {
                return Ok(());
            }
            client
                .send_no_content(Method::POST, &format!("{}/leave", members))
                .await?;
            output::print_success(&format!("Left {}", org));
        }

        MemberCommands::Role { user_id, role } => {
            let body = UpdateRoleRequest {
                role: role.as_str().to_string(),
            };
            let record: MembershipRecord = client
                .patch(&format!("{}/{}/role", members, user_id), &body)
                .await?;
            if format == OutputFormat::Table {
                output::print_success(&format!("{} is now {}", record.user_id, record.role));
            }
            print_record(&record, format)?;
        }

        MemberCommands::Suspend { user_id } => {
            let record: MembershipRecord = client
                .post_empty(&format!("{}/{}/suspend", members, user_id))
                .await?;
            print_record(&record, format)?;
        }

        MemberCommands::Reactivate { user_id } => {
            let record: MembershipRecord = client
                .post_empty(&format!("{}/{}/reactivate", members, user_id))
                .await?;
            print_record(&record, format)?;
        }

        MemberCommands::Remove { user_id, force } => {
            if confirm_needed(force, &format!("remove {} from {}", user_id, org)) {
                return Ok(());
            }
            client
                .send_no_content(Method::DELETE, &format!("{}/{}", members, user_id))
                .await?;
            output::print_success(&format!("Removed {}", user_id));
        }

        MemberCommands::Transfer { user_id, force } => {
            if confirm_needed(force, &format!("make {} the owner of {}", user_id, org)) {
                return Ok(());
            }
            let body = TransferOwnershipRequest { user_id };
            let result: TransferOwnershipResponse = client
                .post(&ApiClient::org_path(org, "/transfer"), &body)
                .await?;
            match format {
                OutputFormat::Table => output::print_success(&format!(
                    "{} is now an owner; {} is now an admin",
                    result.new_owner, result.previous_owner
                )),
                _ => output::print_item(&result, format)?,
            }
        }
    }

    Ok(())
}
