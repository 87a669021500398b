//! Health check command.
//!
//! Queries `/health` and, with `--ready`, the `/ready` database probe.

use anyhow::Result;
use clap::Args;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Also check readiness (database connectivity)
    #[arg(short, long)]
    ready: bool,
}

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get_raw("/health").await?;
    let ready = if args.ready {
        Some(client.get_raw("/ready").await?)
    } else {
        None
    };

    match format {
        OutputFormat::Table => {
            let status = health
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");

            output::print_header("Service Health");
            output::print_detail("Status", status);
            output::print_detail("API URL", client.base_url());

            if let Some(version) = health.get("version").and_then(|v| v.as_str()) {
                output::print_detail("Version", version);
            }

            if let Some(ts) = health.get("timestamp").and_then(|v| v.as_str()) {
                output::print_detail("Timestamp", ts);
            }

            if let Some(ready) = &ready {
                let latency = ready
                    .get("database_latency_ms")
                    .and_then(|v| v.as_u64())
                    .map(|ms| format!("{} ms", ms))
                    .unwrap_or_else(|| "n/a".to_string());
                output::print_detail("Database", &latency);
            }

            if status == "healthy" {
                output::print_success("Service operational");
            } else {
                output::print_error(&format!("Service status: {}", status));
            }
        }
        _ => output::print_item(
            &serde_json::json!({ "health": health, "ready": ready }),
            format,
        )?,
    }

    Ok(())
}
