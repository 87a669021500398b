//! Request-handler gate.
//!
//! A tower layer that runs on every organization-scoped route. It reads the
//! authenticated caller (injected by the auth middleware) and the `:org_id`
//! path segment, resolves the caller's membership, checks the route's
//! [`Requirement`], and either rejects the request or inserts the resolved
//! [`MembershipContext`] into request extensions for the handler.

use axum::{
    body::Body,
    extract::{FromRequestParts, Path, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::authorizer::{Authorizer, Requirement};
use super::catalog::Permission;
use super::models::{MembershipContext, OrganizationId};
use crate::error::OrgAuthError;
use crate::middleware::auth::{AuthContext, AuthError};

/// Path parameter carrying the organization id.
pub const ORG_PATH_PARAM: &str = "org_id";

// ═══════════════════════════════════════════════════════════════════════════════
// Membership Context (extracted in handlers)
// ═══════════════════════════════════════════════════════════════════════════════

/// Axum extractor for the context resolved by [`RequirePermissionLayer`].
#[axum::async_trait]
impl<S> FromRequestParts<S> for MembershipContext
where
    S: Send + Sync,
{
    type Rejection = OrgAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<MembershipContext>()
            .cloned()
            .ok_or_else(|| {
                OrgAuthError::internal(
                    "Membership context not available; route is missing RequirePermissionLayer",
                )
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that wraps services with membership enforcement.
///
/// # Example
///
/// ```rust,ignore
/// use orgauth_core::rbac::{Permission, RequirePermissionLayer};
///
/// let app = Router::new().route(
///     "/api/v1/organizations/:org_id/members",
///     get(list_members).route_layer(RequirePermissionLayer::new(
///         authorizer.clone(),
///         Permission::MemberView,
///     )),
/// );
/// ```
#[derive(Clone)]
pub struct RequirePermissionLayer {
    authorizer: Authorizer,
    requirement: Requirement,
}

impl RequirePermissionLayer {
    /// Require a catalog permission.
    pub fn new(authorizer: Authorizer, permission: Permission) -> Self {
        Self::requiring(authorizer, Requirement::Permission(permission))
    }

    /// Require any [`Requirement`].
    pub fn requiring(authorizer: Authorizer, requirement: Requirement) -> Self {
        Self {
            authorizer,
            requirement,
        }
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            authorizer: self.authorizer.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that enforces a route's requirement per request.
#[derive(Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    authorizer: Authorizer,
    requirement: Requirement,
}

impl<S> Service<Request<Body>> for RequirePermissionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let authorizer = self.authorizer.clone();
        let requirement = self.requirement.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let membership = match gate(&authorizer, &requirement, &mut parts).await {
                Ok(ctx) => ctx,
                Err(e) => return Ok(e.into_response()),
            };

            parts.extensions.insert(membership);
            inner.call(Request::from_parts(parts, body)).await
        })
    }
}

async fn gate(
    authorizer: &Authorizer,
    requirement: &Requirement,
    parts: &mut Parts,
) -> Result<MembershipContext, OrgAuthError> {
    let auth = parts
        .extensions
        .get::<AuthContext>()
        .filter(|ctx| ctx.is_authenticated())
        .cloned()
        .ok_or(AuthError::MissingCredentials)?;

    let organization_id = organization_from_path(parts).await?;

    authorizer
        .authorize(&auth.user_id, &organization_id, requirement)
        .await
}

async fn organization_from_path(parts: &mut Parts) -> Result<OrganizationId, OrgAuthError> {
    let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, &())
        .await
        .map_err(|e| OrgAuthError::internal(format!("Cannot read path parameters: {}", e)))?;

    params
        .get(ORG_PATH_PARAM)
        .filter(|id| !id.trim().is_empty())
        .map(|id| OrganizationId::new(id.as_str()))
        .ok_or_else(|| OrgAuthError::internal("Route has no organization path parameter"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::catalog::Role;
    use crate::rbac::context::{
        InMemoryMembershipStore, MembershipContextProvider, MembershipStore, StoreError,
    };
    use crate::rbac::models::{MembershipRecord, MembershipStatus, UserId};
    use async_trait::async_trait;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Store that fails every call with the same fault.
    struct FailingStore {
        fault: fn() -> StoreError,
    }

    #[async_trait]
    impl MembershipStore for FailingStore {
        async fn get_membership(
            &self,
            _: &UserId,
            _: &OrganizationId,
        ) -> Result<Option<MembershipRecord>, StoreError> {
            Err((self.fault)())
        }

        async fn list_memberships(
            &self,
            _: &OrganizationId,
        ) -> Result<Vec<MembershipRecord>, StoreError> {
            Err((self.fault)())
        }

        async fn insert_membership(&self, _: MembershipRecord) -> Result<(), StoreError> {
            Err((self.fault)())
        }

        async fn update_role(&self, _: &UserId, _: &OrganizationId, _: Role) -> Result<(), StoreError> {
            Err((self.fault)())
        }

        async fn update_status(
            &self,
            _: &UserId,
            _: &OrganizationId,
            _: MembershipStatus,
        ) -> Result<(), StoreError> {
            Err((self.fault)())
        }

        async fn remove_membership(&self, _: &UserId, _: &OrganizationId) -> Result<(), StoreError> {
            Err((self.fault)())
        }

        async fn count_active_owners(&self, _: &OrganizationId) -> Result<usize, StoreError> {
            Err((self.fault)())
        }

        async fn transfer_ownership(
            &self,
            _: &OrganizationId,
            _: &UserId,
            _: &UserId,
        ) -> Result<(), StoreError> {
            Err((self.fault)())
        }
    }

    fn auth_context(user: &str) -> AuthContext {
        AuthContext {
            user_id: UserId::new(user),
            auth_method: crate::middleware::auth::AuthMethod::Jwt,
            token_id: None,
            expires_at: None,
            request_id: "test-req".to_string(),
        }
    }

    fn router() -> Router {
        let store = InMemoryMembershipStore::new();
        let org = OrganizationId::new("org1");
        store.seed(MembershipRecord::active(UserId::new("alice"), org.clone(), Role::Admin));
        store.seed(MembershipRecord::active(UserId::new("mia"), org.clone(), Role::Member));
        store.seed(
            MembershipRecord::active(UserId::new("sam"), org, Role::Owner)
                .with_status(MembershipStatus::Suspended),
        );
        let authorizer = Authorizer::new(MembershipContextProvider::new(Arc::new(store)));

        Router::new().route(
            "/orgs/:org_id/members",
            get(|ctx: MembershipContext| async move { ctx.role.to_string() }).route_layer(
                RequirePermissionLayer::new(authorizer, Permission::MemberRemove),
            ),
        )
    }

    async fn call(user: Option<&str>, org: &str) -> Response {
        let mut request = Request::builder()
            .uri(format!("/orgs/{}/members", org))
            .body(Body::empty())
            .unwrap();
        if let Some(user) = user {
            request.extensions_mut().insert(auth_context(user));
        }
        router().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let response = call(Some("alice"), "org1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"admin");
    }

    #[tokio::test]
    async fn test_denials_are_forbidden() {
        assert_eq!(call(Some("mia"), "org1").await.status(), StatusCode::FORBIDDEN);
        assert_eq!(call(Some("sam"), "org1").await.status(), StatusCode::FORBIDDEN);
        assert_eq!(call(Some("alice"), "org2").await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unauthenticated_is_unauthorized() {
        assert_eq!(call(None, "org1").await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_context_is_internal_error() {
        let app = Router::new().route("/", get(|_ctx: MembershipContext| async { "unreachable" }));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn call_failing(fault: fn() -> StoreError) -> (Response, usize) {
        let handled = Arc::new(AtomicUsize::new(0));
        let counter = handled.clone();
        let authorizer =
            Authorizer::new(MembershipContextProvider::new(Arc::new(FailingStore { fault })));
        let app = Router::new().route(
            "/orgs/:org_id/members",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "handled"
                }
            })
            .route_layer(RequirePermissionLayer::new(authorizer, Permission::MemberView)),
        );

        let mut request = Request::builder()
            .uri("/orgs/org1/members")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(auth_context("alice"));
        let response = app.oneshot(request).await.unwrap();
        (response, handled.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_store_outage_is_unavailable_not_allowed() {
        let (response, handled) =
            call_failing(|| StoreError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(handled, 0);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_internal_error_not_allowed() {
        let (response, handled) = call_failing(|| StoreError::CorruptRecord {
            field: "role",
            value: "superuser".into(),
        })
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(handled, 0);
    }
}
