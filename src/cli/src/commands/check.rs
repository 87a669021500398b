//! Ask the server whether the caller holds a set of permissions.

use anyhow::{bail, Result};
use clap::Args;
use orgauth_core::api::handlers::{AuthorizeRequest, CheckMode};
use orgauth_core::rbac::{catalog, AuthorizationResult};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// Permission tokens, e.g. `member:invite post:publish`
    #[arg(required = true)]
    permissions: Vec<String>,

    /// Allow when any one permission is held (default: all of them)
    #[arg(long)]
    any: bool,

    /// Exit with status 1 when the check is denied
    #[arg(long)]
    strict: bool,
}

impl CheckArgs {
    fn request(&self) -> AuthorizeRequest {
        AuthorizeRequest {
            permissions: self.permissions.clone(),
            mode: if self.any { CheckMode::Any } else { CheckMode::All },
        }
    }
}

/// Tokens the catalog does not know. The server still answers for them
/// (they are never granted), so this only warns.
fn unknown_tokens(permissions: &[String]) -> Vec<&str> {
    permissions
        .iter()
        .map(String::as_str)
        .filter(|p| !catalog::is_valid_permission(p))
        .collect()
}

pub async fn execute(
    args: CheckArgs,
    client: &ApiClient,
    org: &str,
    format: OutputFormat,
) -> Result<()> {
    for token in unknown_tokens(&args.permissions) {
        output::print_info(&format!("'{}' is not a known permission", token));
    }

    let result: AuthorizationResult = client
        .post(&ApiClient::org_path(org, "/authorize"), &args.request())
        .await?;

    match format {
        OutputFormat::Table => match result {
            AuthorizationResult::Allowed => output::print_success("allowed"),
            AuthorizationResult::Denied(reason) => {
                output::print_error(&format!("denied: {}", reason))
            }
        },
        _ => output::print_item(&result, format)?,
    }

    if args.strict && result.is_denied() {
        bail!("permission check denied");
    }
    Ok(())
}
