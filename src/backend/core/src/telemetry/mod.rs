//! Telemetry: logging, optional distributed tracing, and metrics.
//!
//! # Example
//!
//! ```rust,no_run
//! use orgauth_core::{config::Config, telemetry::init_telemetry};
//!
//! let config = Config::load()?;
//! let telemetry = init_telemetry(&config.observability)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, shutdown_tracing, LogFormat, LoggingConfig};
pub use self::metrics::{init_metrics, MetricsRegistry};

use crate::config::ObservabilityConfig;

/// Initialize the complete telemetry stack. Call once at startup.
///
/// # Errors
///
/// Returns an error if any component fails to initialize.
pub fn init_telemetry(config: &ObservabilityConfig) -> anyhow::Result<TelemetryHandle> {
    let logging = LoggingConfig {
        level: config.log_level.clone(),
        format: config.log_format,
        include_location: config.include_location,
        otlp_endpoint: config.otlp_endpoint.clone(),
    };
    init_logging(&logging, &config.service_name)?;

    let metrics = init_metrics(config.metrics_enabled, &config.service_name)?;

    Ok(TelemetryHandle { metrics })
}

/// Handle for managing telemetry lifecycle.
#[derive(Debug)]
pub struct TelemetryHandle {
    pub metrics: MetricsRegistry,
}

impl TelemetryHandle {
    /// Flush remaining spans.
    pub fn shutdown(self) {
        shutdown_tracing();
        ::tracing::info!("Telemetry shutdown complete");
    }
}
