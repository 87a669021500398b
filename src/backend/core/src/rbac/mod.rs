//! Organization-scoped role-based access control.
//!
//! This module provides:
//! - **Catalog**: the fixed roles, permission tokens, and role grants
//! - **Evaluator**: pure checks over a caller's [`MembershipContext`]
//! - **Context Provider**: live membership lookup behind a store trait
//! - **Authorizer**: resolve, evaluate, record, and reject in one step
//! - **Enforcement**: the request-handler gate (tower layer) and the
//!   presentation gate for clients
//!
//! # Usage
//!
//! ```rust,ignore
//! use orgauth_core::rbac::{policy, Permission, MembershipContextProvider};
//!
//! let ctx = provider.resolve(&user_id, &org_id).await?;
//! let decision = policy::can_access(ctx.as_ref(), Permission::MemberRemove);
//!
//! // Or enforce on a route
//! let app = Router::new().route(
//!     "/api/v1/organizations/:org_id/members/:user_id",
//!     delete(remove_member)
//!         .route_layer(RequirePermissionLayer::new(authorizer, Permission::MemberRemove)),
//! );
//! ```

pub mod authorizer;
pub mod catalog;
pub mod context;
pub mod gate;
pub mod middleware;
pub mod models;
pub mod policy;

pub use authorizer::{Authorizer, Requirement};
pub use catalog::{CatalogError, Permission, PermissionSet, Role};
pub use context::{
    InMemoryMembershipStore, MembershipContextProvider, MembershipStore, StoreError,
};
pub use gate::{render_if, PermissionSummary};
pub use middleware::{RequirePermissionLayer, RequirePermissionService};
pub use models::{
    MembershipContext, MembershipRecord, MembershipStatus, OrganizationId, UserId,
};
pub use policy::{AuthorizationResult, DenialReason};
