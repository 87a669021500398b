//! Error handling for OrgAuth Core.
//!
//! This module provides:
//! - A single service error type with machine-readable codes
//! - HTTP status code mapping for API responses
//! - User-facing messages kept apart from internal detail
//! - Severity-based logging and an error counter metric
//!
//! Authorization denials travel through the evaluator as plain values and only
//! become an [`OrgAuthError`] at the HTTP boundary. Store failures are faults
//! with their own codes and are never folded into a denial.
//!
//! # Usage
//!
//! ```rust,ignore
//! use orgauth_core::error::{OrgAuthError, Result};
//!
//! async fn load(store: &dyn MembershipStore) -> Result<MembershipRecord> {
//!     store
//!         .get_membership(&user, &org)
//!         .await?
//!         .ok_or_else(|| OrgAuthError::membership_not_found(user.as_str()))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::rbac::{CatalogError, DenialReason, StoreError};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for OrgAuth operations.
pub type Result<T> = std::result::Result<T, OrgAuthError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Database Errors (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    CorruptRecord,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,

    // Authentication (4000-4099)
    Unauthorized,
    InvalidToken,
    TokenExpired,

    // Authorization (4100-4199)
    OrganizationNotAccessible,
    MembershipInactive,
    MissingPermission,
    InsufficientRole,
    CannotManageTarget,
    LastOwner,

    // Membership (4200-4299)
    MembershipNotFound,
    MembershipAlreadyExists,
    InvalidMembershipState,

    // Validation Errors (4300-4399)
    ValidationError,
    InvalidInput,
    UnknownRole,
    UnknownPermission,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
    UnknownError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::DatabaseQueryFailed => 2002,
            Self::CorruptRecord => 2003,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,

            Self::Unauthorized => 4000,
            Self::InvalidToken => 4001,
            Self::TokenExpired => 4002,

            Self::OrganizationNotAccessible => 4101,
            Self::MembershipInactive => 4102,
            Self::MissingPermission => 4103,
            Self::InsufficientRole => 4104,
            Self::CannotManageTarget => 4105,
            Self::LastOwner => 4106,

            Self::MembershipNotFound => 4200,
            Self::MembershipAlreadyExists => 4201,
            Self::InvalidMembershipState => 4202,

            Self::ValidationError => 4300,
            Self::InvalidInput => 4301,
            Self::UnknownRole => 4302,
            Self::UnknownPermission => 4303,

            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            Self::InternalError => 9000,
            Self::UnknownError => 9099,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidToken | Self::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            Self::OrganizationNotAccessible
            | Self::MembershipInactive
            | Self::MissingPermission
            | Self::InsufficientRole
            | Self::CannotManageTarget => StatusCode::FORBIDDEN,

            Self::MembershipNotFound => StatusCode::NOT_FOUND,

            Self::LastOwner
            | Self::MembershipAlreadyExists
            | Self::InvalidMembershipState => StatusCode::CONFLICT,

            Self::ValidationError
            | Self::InvalidInput
            | Self::UnknownRole
            | Self::UnknownPermission
            | Self::DeserializationError => StatusCode::UNPROCESSABLE_ENTITY,

            Self::DatabaseConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,

            Self::DatabaseError
            | Self::DatabaseQueryFailed
            | Self::CorruptRecord
            | Self::SerializationError
            | Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InternalError
            | Self::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseConnectionFailed | Self::DatabaseQueryFailed
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            2000..=2099 => "database",
            2200..=2299 => "serialization",
            4000..=4099 => "authentication",
            4100..=4199 => "authorization",
            4200..=4299 => "membership",
            4300..=4399 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Expected outcomes: denials, bad input, missing records
    Low,
    /// Authentication failures
    Medium,
    /// System errors (query failures, corrupt data)
    High,
    /// The service cannot reach its store or is misconfigured
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::OrganizationNotAccessible
            | ErrorCode::MembershipInactive
            | ErrorCode::MissingPermission
            | ErrorCode::InsufficientRole
            | ErrorCode::CannotManageTarget
            | ErrorCode::LastOwner
            | ErrorCode::MembershipNotFound
            | ErrorCode::MembershipAlreadyExists
            | ErrorCode::InvalidMembershipState
            | ErrorCode::ValidationError
            | ErrorCode::InvalidInput
            | ErrorCode::UnknownRole
            | ErrorCode::UnknownPermission
            | ErrorCode::DeserializationError => Self::Low,

            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                Self::Medium
            }

            ErrorCode::DatabaseError
            | ErrorCode::DatabaseQueryFailed
            | ErrorCode::CorruptRecord
            | ErrorCode::SerializationError => Self::High,

            ErrorCode::DatabaseConnectionFailed
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration
            | ErrorCode::InternalError
            | ErrorCode::UnknownError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (user, organization)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    fn is_empty(&self) -> bool {
        self.context.is_empty() && self.entity_id.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for OrgAuth Core.
#[derive(Error, Debug)]
pub struct OrgAuthError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for OrgAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl OrgAuthError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Target member of a management action does not exist in the organization.
    pub fn membership_not_found(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self::new(ErrorCode::MembershipNotFound, "Member not found")
            .with_details(ErrorDetails::new().with_entity("user", user_id))
    }

    /// Membership exists but is in the wrong state for the requested transition.
    pub fn invalid_state(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidMembershipState, message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "Low severity error"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    fn record_metrics(&self) {
        counter!(
            "orgauth_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Whether the request was successful (always false for errors)
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&OrgAuthError> for ErrorResponse {
    fn from(error: &OrgAuthError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.is_empty() {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for OrgAuthError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

/// Denials become 403s (409 for the owner-continuity rule).
///
/// `NoMembership` deliberately shares its message with "organization does not
/// exist": the boundary must not reveal which one applies.
impl From<DenialReason> for OrgAuthError {
    fn from(reason: DenialReason) -> Self {
        let (code, user_msg) = match reason {
            DenialReason::NoMembership => (
                ErrorCode::OrganizationNotAccessible,
                "Organization not found or not accessible",
            ),
            DenialReason::Suspended => (
                ErrorCode::MembershipInactive,
                "Your membership in this organization is not active",
            ),
            DenialReason::InsufficientRole => (
                ErrorCode::InsufficientRole,
                "Your role does not allow this action",
            ),
            DenialReason::MissingPermission => (
                ErrorCode::MissingPermission,
                "You do not have permission to perform this action",
            ),
            DenialReason::CannotManageEqualOrHigherRole => (
                ErrorCode::CannotManageTarget,
                "You cannot manage members with an equal or higher role",
            ),
            DenialReason::LastOwner => (
                ErrorCode::LastOwner,
                "An organization must keep at least one active owner",
            ),
        };

        Self::with_internal(code, user_msg, reason.as_str())
    }
}

impl From<StoreError> for OrgAuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Database(e) => Self::from(e),
            StoreError::CorruptRecord { field, value } => Self::with_internal(
                ErrorCode::CorruptRecord,
                "An internal error occurred",
                format!("Corrupt membership record: {}={}", field, value),
            ),
            StoreError::AlreadyExists { user, .. } => Self::new(
                ErrorCode::MembershipAlreadyExists,
                "This user already has a membership in the organization",
            )
            .with_details(ErrorDetails::new().with_entity("user", user)),
            StoreError::NotFound { user, .. } => Self::membership_not_found(user),
            StoreError::WouldOrphanOrganization(_) => Self::from(DenialReason::LastOwner),
            StoreError::TransferRejected { reason, .. } => Self::with_internal(
                ErrorCode::InvalidMembershipState,
                "Ownership can no longer be transferred to this member",
                format!("Transfer rejected: {}", reason),
            )
            .with_details(ErrorDetails::new().with_context("reason", reason)),
        }
    }
}

impl From<CatalogError> for OrgAuthError {
    fn from(error: CatalogError) -> Self {
        let code = match &error {
            CatalogError::UnknownRole(_) => ErrorCode::UnknownRole,
            CatalogError::UnknownPermission(_) => ErrorCode::UnknownPermission,
        };
        Self::new(code, error.to_string())
    }
}

impl From<sqlx::Error> for OrgAuthError {
    fn from(error: sqlx::Error) -> Self {
        let (code, user_msg) = match &error {
            sqlx::Error::RowNotFound => (
                ErrorCode::MembershipNotFound,
                "The requested record was not found",
            ),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("pkey") || constraint.contains("unique") {
                        return Self::with_internal(
                            ErrorCode::MembershipAlreadyExists,
                            "This user already has a membership in the organization",
                            format!("Constraint violation: {}", constraint),
                        )
                        .with_source(error);
                    }
                }
                (ErrorCode::DatabaseQueryFailed, "A database error occurred")
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => (
                ErrorCode::DatabaseConnectionFailed,
                "Unable to connect to the database",
            ),
            _ => (ErrorCode::DatabaseError, "A database error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for OrgAuthError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() || error.is_eof() {
            ErrorCode::DeserializationError
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

impl From<anyhow::Error> for OrgAuthError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<OrgAuthError>() {
            Ok(orgauth_error) => orgauth_error,
            Err(error) => Self::with_internal(
                ErrorCode::InternalError,
                "An internal error occurred",
                error.to_string(),
            ),
        }
    }
}

impl From<config::ConfigError> for OrgAuthError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (
                ErrorCode::ConfigurationError,
                "Configuration error occurred",
            ),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_status_codes() {
        let cases = [
            (DenialReason::NoMembership, StatusCode::FORBIDDEN),
            (DenialReason::Suspended, StatusCode::FORBIDDEN),
            (DenialReason::InsufficientRole, StatusCode::FORBIDDEN),
            (DenialReason::MissingPermission, StatusCode::FORBIDDEN),
            (DenialReason::CannotManageEqualOrHigherRole, StatusCode::FORBIDDEN),
            (DenialReason::LastOwner, StatusCode::CONFLICT),
        ];
        for (reason, status) in cases {
            assert_eq!(OrgAuthError::from(reason).http_status(), status);
        }
    }

    #[test]
    fn test_no_membership_message_does_not_leak() {
        let err = OrgAuthError::from(DenialReason::NoMembership);
        assert_eq!(err.code(), ErrorCode::OrganizationNotAccessible);
        assert_eq!(err.user_message(), "Organization not found or not accessible");
        assert_eq!(err.internal_message(), Some("no_membership"));

        let body = ErrorResponse::from(&err);
        let json = serde_json::to_value(&body).unwrap();
        assert!(!json.to_string().contains("no_membership"));
    }

    #[test]
    fn test_store_faults_are_not_denials() {
        let err = OrgAuthError::from(StoreError::CorruptRecord {
            field: "role",
            value: "superuser".into(),
        });
        assert_eq!(err.code(), ErrorCode::CorruptRecord);
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = OrgAuthError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.code(), ErrorCode::DatabaseConnectionFailed);
        assert_eq!(err.http_status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_orphan_maps_to_last_owner() {
        let err = OrgAuthError::from(StoreError::WouldOrphanOrganization("org1".into()));
        assert_eq!(err.code(), ErrorCode::LastOwner);
        assert_eq!(err.http_status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::MissingPermission.category(), "authorization");
        assert_eq!(ErrorCode::TokenExpired.category(), "authentication");
        assert_eq!(ErrorCode::CorruptRecord.category(), "database");
        assert_eq!(ErrorCode::UnknownRole.category(), "validation");
    }

    #[test]
    fn test_rejected_transfer_is_a_conflict() {
        let err = OrgAuthError::from(StoreError::TransferRejected {
            org: "org1".into(),
            reason: "new owner is not an active member",
        });
        assert_eq!(err.code(), ErrorCode::InvalidMembershipState);
        assert_eq!(err.http_status(), StatusCode::CONFLICT);

        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(
            json["error"]["details"]["context"]["reason"],
            "new owner is not an active member"
        );
    }

    #[test]
    fn test_display_includes_internal() {
        let err = OrgAuthError::internal("pool exhausted");
        assert_eq!(
            err.to_string(),
            "[InternalError] An internal error occurred (internal: pool exhausted)"
        );
    }
}
