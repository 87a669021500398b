//! Prometheus metrics.
//!
//! Counters are recorded with the `metrics` macros where the events happen;
//! this module installs the recorder and renders the scrape output.
//!
//! | metric | labels |
//! |--------|--------|
//! | `orgauth_authz_decisions_total` | `outcome`, `reason` |
//! | `orgauth_membership_lookups_total` | `result` |
//! | `orgauth_membership_changes_total` | `action` |
//! | `orgauth_auth_success_total` | `method` |
//! | `orgauth_errors_total` | `code`, `category`, `severity`, `retryable` |

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;

/// Handle to the installed Prometheus recorder.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("enabled", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with no recorder; `/metrics` reports nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Wrap an existing handle (tests build one without installing it).
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self {
            prometheus_handle: Some(handle),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> Option<String> {
        self.prometheus_handle.as_ref().map(|h| h.render())
    }
}

/// Install the global Prometheus recorder.
pub fn init_metrics(enabled: bool, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", service_name)
        .install_recorder()?;

    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry::from_handle(handle))
}

fn register_metric_descriptions() {
    describe_counter!(
        "orgauth_authz_decisions_total",
        "Authorization decisions made at enforcement points"
    );
    describe_counter!(
        "orgauth_membership_lookups_total",
        "Membership context lookups by result"
    );
    describe_counter!(
        "orgauth_membership_changes_total",
        "Membership mutations applied"
    );
    describe_counter!(
        "orgauth_auth_success_total",
        "Successfully authenticated requests"
    );
    describe_counter!("orgauth_errors_total", "Errors raised by the service");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_registry_renders_nothing() {
        let registry = MetricsRegistry::disabled();
        assert!(!registry.is_enabled());
        assert!(registry.render().is_none());
    }

    #[test]
    fn test_handle_renders() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let registry = MetricsRegistry::from_handle(recorder.handle());
        assert!(registry.is_enabled());
        assert!(registry.render().is_some());
    }
}
