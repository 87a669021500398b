#![allow(clippy::result_large_err)]
//! # OrgAuth Core
//!
//! Organization-scoped role-based access control.
//!
//! ## Architecture
//!
//! - **Catalog**: four hierarchical roles and the permission tokens each grants
//! - **Evaluator**: pure, fail-closed checks over a resolved membership context
//! - **Context Provider**: live membership lookup behind a store trait
//! - **Enforcement**: a tower layer for request handlers and a presentation gate
//! - **Storage**: PostgreSQL via sqlx, with an in-memory store for tests
//! - **Telemetry**: structured logging, optional OTLP traces, Prometheus metrics
//! - **Middleware**: bearer-token authentication

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod rbac;
pub mod telemetry;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, OrgAuthError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ErrorCode, ErrorDetails, ErrorSeverity, OrgAuthError, Result};
    pub use crate::middleware::{AuthConfig, AuthContext, AuthError, AuthLayer, AuthMethod, Claims};
    pub use crate::rbac::{
        policy, render_if, AuthorizationResult, Authorizer, CatalogError, DenialReason,
        InMemoryMembershipStore, MembershipContext, MembershipContextProvider, MembershipRecord,
        MembershipStatus, MembershipStore, OrganizationId, Permission, PermissionSet,
        PermissionSummary, RequirePermissionLayer, Requirement, Role, StoreError, UserId,
    };
}
