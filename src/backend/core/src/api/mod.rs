//! HTTP API for OrgAuth.
//!
//! Every organization-scoped route lives under
//! `/api/v1/organizations/:org_id` and carries its own
//! [`RequirePermissionLayer`], so no handler runs without a resolved and
//! checked [`MembershipContext`](crate::rbac::MembershipContext).
//!
//! | method | path | requirement |
//! |--------|------|-------------|
//! | GET | `/me/permissions` | any membership |
//! | GET | `/members` | `member:view` |
//! | POST | `/members` | `member:invite` |
//! | POST | `/members/accept` | any membership |
//! | POST | `/members/leave` | active membership |
//! | PATCH | `/members/:user_id/role` | `member:update_role` |
//! | POST | `/members/:user_id/suspend` | `member:suspend` |
//! | POST | `/members/:user_id/reactivate` | `member:suspend` |
//! | DELETE | `/members/:user_id` | `member:remove` |
//! | POST | `/transfer` | `organization:transfer` |
//! | POST | `/authorize` | any membership |

pub mod handlers;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::db::Database;
use crate::middleware::auth::AuthLayer;
use crate::rbac::{
    Authorizer, MembershipContextProvider, MembershipStore, Permission, RequirePermissionLayer,
    Requirement,
};
use crate::telemetry::MetricsRegistry;

/// Prefix of every organization-scoped route.
pub const ORGANIZATION_SCOPE: &str = "/api/v1/organizations/:org_id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Authorizer,
    pub metrics: MetricsRegistry,
    /// Present when backed by PostgreSQL; used by the readiness probe.
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(store: Arc<dyn MembershipStore>, metrics: MetricsRegistry) -> Self {
        Self {
            authorizer: Authorizer::new(MembershipContextProvider::new(store)),
            metrics,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        self.authorizer.provider().store()
    }
}

/// Build the API router.
///
/// # Example
///
/// ```rust,ignore
/// let state = AppState::new(Arc::new(db.membership_store()), telemetry.metrics);
/// let app = build_router(state, AuthLayer::from_config(auth_config)?, Duration::from_secs(30));
/// ```
pub fn build_router(state: AppState, auth: AuthLayer, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest(ORGANIZATION_SCOPE, organization_routes(&state.authorizer))
        .layer(auth)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn organization_routes(authorizer: &Authorizer) -> Router<AppState> {
    let gate = |requirement: Requirement| {
        RequirePermissionLayer::requiring(authorizer.clone(), requirement)
    };

    Router::new()
        .route(
            "/me/permissions",
            get(handlers::my_permissions).route_layer(gate(Requirement::Membership)),
        )
        .route(
            "/members",
            get(handlers::list_members).route_layer(gate(Permission::MemberView.into())),
        )
        .route(
            "/members",
            post(handlers::invite_member).route_layer(gate(Permission::MemberInvite.into())),
        )
        .route(
            "/members/accept",
            post(handlers::accept_invitation).route_layer(gate(Requirement::Membership)),
        )
        .route(
            "/members/leave",
            post(handlers::leave_organization).route_layer(gate(Requirement::ActiveMembership)),
        )
        .route(
            "/members/:user_id/role",
            patch(handlers::update_member_role)
                .route_layer(gate(Permission::MemberUpdateRole.into())),
        )
        .route(
            "/members/:user_id/suspend",
            post(handlers::suspend_member).route_layer(gate(Permission::MemberSuspend.into())),
        )
        .route(
            "/members/:user_id/reactivate",
            post(handlers::reactivate_member).route_layer(gate(Permission::MemberSuspend.into())),
        )
        .route(
            "/members/:user_id",
            delete(handlers::remove_member).route_layer(gate(Permission::MemberRemove.into())),
        )
        .route(
            "/transfer",
            post(handlers::transfer_ownership)
                .route_layer(gate(Permission::OrganizationTransfer.into())),
        )
        .route(
            "/authorize",
            post(handlers::authorize).route_layer(gate(Requirement::Membership)),
        )
}

/// Success envelope. Errors are rendered by
/// [`OrgAuthError`](crate::error::OrgAuthError) as
/// [`ErrorResponse`](crate::error::ErrorResponse).
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::InMemoryMembershipStore;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, Some("test data"));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": "test data" }));
    }

    #[test]
    fn test_app_state_without_database() {
        let state = AppState::new(
            Arc::new(InMemoryMembershipStore::new()),
            MetricsRegistry::disabled(),
        );
        assert!(state.db.is_none());
        assert!(!state.metrics.is_enabled());
    }
}
