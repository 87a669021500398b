//! Configuration management.
//!
//! Values come from an optional file plus `ORGAUTH__`-prefixed environment
//! variables, e.g. `ORGAUTH__DATABASE__URL` or `ORGAUTH__AUTH__JWT_SECRET`.

use serde::Deserialize;
use std::time::Duration;

use crate::middleware::auth::{AuthConfig, SigningAlgorithm};
use crate::telemetry::LogFormat;

const ENV_PREFIX: &str = "ORGAUTH";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token validation
    pub auth: AuthSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long to wait for a pooled connection
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,

    /// Apply embedded migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret for bearer tokens
    pub jwt_secret: String,

    /// `HS256`, `HS384` or `HS512`
    #[serde(default)]
    pub jwt_algorithm: SigningAlgorithm,

    /// Expected `iss` claim
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected `aud` claim
    #[serde(default)]
    pub audience: Option<String>,

    /// Clock skew tolerance for `exp`
    #[serde(default = "default_leeway", with = "humantime_serde")]
    pub leeway: Duration,
}

impl AuthSettings {
    /// Convert into the middleware's configuration.
    pub fn to_auth_config(&self) -> AuthConfig {
        let mut builder = AuthConfig::builder()
            .jwt_secret(self.jwt_secret.clone())
            .algorithm(self.jwt_algorithm)
            .leeway_secs(self.leeway.as_secs());
        if let Some(ref issuer) = self.issuer {
            builder = builder.issuer(issuer.clone());
        }
        if let Some(ref audience) = self.audience {
            builder = builder.audience(audience.clone());
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Service name reported in traces and metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Include file/line in log events
    #[serde(default)]
    pub include_location: bool,

    /// Install the Prometheus recorder and serve `/metrics`
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otlp_endpoint: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            include_location: false,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> Duration { Duration::from_secs(30) }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_acquire_timeout() -> Duration { Duration::from_secs(5) }
fn default_run_migrations() -> bool { true }
fn default_leeway() -> Duration { Duration::from_secs(60) }
fn default_service_name() -> String { "orgauth-server".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_enabled() -> bool { true }

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgres://localhost/orgauth"
acquire_timeout = "2s"

[auth]
jwt_secret = "s3cret"
issuer = "orgauth"

[observability]
log_format = "pretty"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(2));
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.observability.metrics_enabled);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");

        let auth = config.auth.to_auth_config();
        assert_eq!(auth.issuer.as_deref(), Some("orgauth"));
        assert_eq!(auth.leeway_secs, 60);
        assert_eq!(auth.algorithm, SigningAlgorithm::Hs256);
    }

    #[test]
    fn test_jwt_algorithm_setting() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\nurl = \"postgres://localhost/orgauth\"\n[auth]\njwt_secret = \"s3cret\"\njwt_algorithm = \"HS512\"\n"
        )
        .unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.auth.to_auth_config().algorithm, SigningAlgorithm::Hs512);

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\nurl = \"postgres://localhost/orgauth\"\n[auth]\njwt_secret = \"s3cret\"\njwt_algorithm = \"RS256\"\n"
        )
        .unwrap();
        assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[database]\nurl = \"postgres://localhost/orgauth\"\n[auth]\n").unwrap();
        assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
    }
}
