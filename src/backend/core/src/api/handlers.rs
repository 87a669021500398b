//! API request handlers with proper error propagation.
//!
//! All handlers return `Result<impl IntoResponse, OrgAuthError>` so that
//! errors are converted to HTTP status codes via the `IntoResponse`
//! implementation on `OrgAuthError`.
//!
//! Organization handlers receive the caller's [`MembershipContext`] from the
//! route's [`RequirePermissionLayer`](crate::rbac::RequirePermissionLayer).
//! Anything that depends on the target member is checked here, after the
//! target has been loaded.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResponse, AppState};
use crate::error::{ErrorCode, ErrorDetails, OrgAuthError};
use crate::rbac::{
    policy, AuthorizationResult, DenialReason, MembershipContext, MembershipRecord, MembershipStatus,
    OrganizationId, Permission, PermissionSummary, Role, UserId,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness: the database answers a trivial query.
pub async fn readiness(State(state): State<AppState>) -> Result<impl IntoResponse, OrgAuthError> {
    let latency_ms = match &state.db {
        Some(db) => Some(
            db.check_connectivity()
                .await
                .map_err(|e| {
                    OrgAuthError::new(
                        ErrorCode::DatabaseConnectionFailed,
                        "Service temporarily unavailable",
                    )
                    .with_source(e)
                })?
                .as_millis() as u64,
        ),
        None => None,
    };

    Ok(Json(serde_json::json!({
        "status": "ready",
        "database_latency_ms": latency_ms,
    })))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Some(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request / Response Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Path parameters of `/organizations/:org_id/members/:user_id/...`.
#[derive(Debug, Deserialize)]
pub struct MemberPath {
    pub org_id: String,
    pub user_id: String,
}

impl MemberPath {
    fn ids(&self) -> (OrganizationId, UserId) {
        (
            OrganizationId::new(self.org_id.clone()),
            UserId::new(self.user_id.clone()),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteMemberRequest {
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferOwnershipRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferOwnershipResponse {
    pub previous_owner: UserId,
    pub new_owner: UserId,
}

/// How `/authorize` combines the requested permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub permissions: Vec<String>,
    #[serde(default)]
    pub mode: CheckMode,
}

fn require_user_id(raw: &str) -> Result<UserId, OrgAuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OrgAuthError::validation("user_id cannot be empty"));
    }
    Ok(UserId::new(trimmed))
}

fn record_change(action: &'static str, ctx: &MembershipContext, target: &UserId) {
    counter!("orgauth_membership_changes_total", "action" => action).increment(1);
    info!(
        org_id = %ctx.organization_id,
        actor = %ctx.user_id,
        target = %target,
        action = action,
        "Membership changed"
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Self-service Handlers
// ═══════════════════════════════════════════════════════════════════════════════

/// The caller's role, status and effective permissions.
pub async fn my_permissions(ctx: MembershipContext) -> impl IntoResponse {
    Json(ApiResponse::success(PermissionSummary::for_context(&ctx)))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    ctx: MembershipContext,
) -> Result<impl IntoResponse, OrgAuthError> {
    if ctx.status != MembershipStatus::Invited {
        return Err(OrgAuthError::invalid_state("There is no pending invitation to accept"));
    }

    state
        .store()
        .update_status(&ctx.user_id, &ctx.organization_id, MembershipStatus::Active)
        .await?;
    record_change("accept", &ctx, &ctx.user_id);

    let updated = state.authorizer.target(&ctx.organization_id, &ctx.user_id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn leave_organization(
    State(state): State<AppState>,
    ctx: MembershipContext,
) -> Result<impl IntoResponse, OrgAuthError> {
    let owners = state.store().count_active_owners(&ctx.organization_id).await?;
    state
        .authorizer
        .enforce(&ctx, "member.leave", policy::can_leave(&ctx, owners))?;

    state
        .store()
        .remove_membership(&ctx.user_id, &ctx.organization_id)
        .await?;
    record_change("leave", &ctx, &ctx.user_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Evaluate a list of permission tokens for the caller.
///
/// Always answers 200 with the decision; unknown tokens are denied, not
/// rejected.
pub async fn authorize(
    ctx: MembershipContext,
    Json(req): Json<AuthorizeRequest>,
) -> impl IntoResponse {
    let result: AuthorizationResult = match req.mode {
        CheckMode::All => policy::can_access_all_tokens(Some(&ctx), req.permissions.as_slice()),
        CheckMode::Any => policy::can_access_any_tokens(Some(&ctx), req.permissions.as_slice()),
    };
    Json(ApiResponse::success(result))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Member Management Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_members(
    State(state): State<AppState>,
    ctx: MembershipContext,
) -> Result<impl IntoResponse, OrgAuthError> {
    let members = state.store().list_memberships(&ctx.organization_id).await?;
    Ok(Json(ApiResponse::success(members)))
}

pub async fn invite_member(
    State(state): State<AppState>,
    ctx: MembershipContext,
    Json(req): Json<InviteMemberRequest>,
) -> Result<impl IntoResponse, OrgAuthError> {
    let user_id = require_user_id(&req.user_id)?;
    let role: Role = req.role.parse()?;
    state
        .authorizer
        .enforce(&ctx, "member.invite", policy::can_invite(&ctx, role))?;

    let record = MembershipRecord::invitation(
        user_id.clone(),
        ctx.organization_id.clone(),
        role,
        ctx.user_id.clone(),
    );
    state.store().insert_membership(record.clone()).await?;
    record_change("invite", &ctx, &user_id);

    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    ctx: MembershipContext,
    Path(path): Path<MemberPath>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, OrgAuthError> {
    let (org_id, user_id) = path.ids();
    let new_role: Role = req.role.parse()?;

    let decision = if user_id == ctx.user_id {
        let owners = state.store().count_active_owners(&org_id).await?;
        policy::can_change_own_role(&ctx, new_role, owners)
    } else {
        let target = state.authorizer.target(&org_id, &user_id).await?;
        policy::can_assign_role(&ctx, target.role, new_role)
    };
    state.authorizer.enforce(&ctx, "member.update_role", decision)?;

    state.store().update_role(&user_id, &org_id, new_role).await?;
    record_change("update_role", &ctx, &user_id);

    let updated = state.authorizer.target(&org_id, &user_id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn suspend_member(
    State(state): State<AppState>,
    ctx: MembershipContext,
    Path(path): Path<MemberPath>,
) -> Result<impl IntoResponse, OrgAuthError> {
    let (org_id, user_id) = path.ids();
    let target = state.authorizer.target(&org_id, &user_id).await?;
    state.authorizer.enforce(
        &ctx,
        "member.suspend",
        policy::can_manage_with(&ctx, Permission::MemberSuspend, target.role),
    )?;

    if target.status != MembershipStatus::Active {
        return Err(OrgAuthError::invalid_state("Only active members can be suspended"));
    }

    state
        .store()
        .update_status(&user_id, &org_id, MembershipStatus::Suspended)
        .await?;
    record_change("suspend", &ctx, &user_id);

    Ok(Json(ApiResponse::success(target.with_status(MembershipStatus::Suspended))))
}

pub async fn reactivate_member(
    State(state): State<AppState>,
    ctx: MembershipContext,
    Path(path): Path<MemberPath>,
) -> Result<impl IntoResponse, OrgAuthError> {
    let (org_id, user_id) = path.ids();
    let target = state.authorizer.target(&org_id, &user_id).await?;
    state.authorizer.enforce(
        &ctx,
        "member.reactivate",
        policy::can_manage_with(&ctx, Permission::MemberSuspend, target.role),
    )?;

    if target.status != MembershipStatus::Suspended {
        return Err(OrgAuthError::invalid_state("Only suspended members can be reactivated"));
    }

    state
        .store()
        .update_status(&user_id, &org_id, MembershipStatus::Active)
        .await?;
    record_change("reactivate", &ctx, &user_id);

    Ok(Json(ApiResponse::success(target.with_status(MembershipStatus::Active))))
}

pub async fn remove_member(
    State(state): State<AppState>,
    ctx: MembershipContext,
    Path(path): Path<MemberPath>,
) -> Result<impl IntoResponse, OrgAuthError> {
    let (org_id, user_id) = path.ids();
    let target = state.authorizer.target(&org_id, &user_id).await?;
    state.authorizer.enforce(
        &ctx,
        "member.remove",
        policy::can_manage_with(&ctx, Permission::MemberRemove, target.role),
    )?;

    state.store().remove_membership(&user_id, &org_id).await?;
    record_change("remove", &ctx, &user_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Hand ownership to another active member. The caller becomes an admin.
pub async fn transfer_ownership(
    State(state): State<AppState>,
    ctx: MembershipContext,
    Json(req): Json<TransferOwnershipRequest>,
) -> Result<impl IntoResponse, OrgAuthError> {
    let new_owner = require_user_id(&req.user_id)?;
    let target = state
        .authorizer
        .resolve(&new_owner, &ctx.organization_id)
        .await?
        .ok_or_else(|| OrgAuthError::membership_not_found(new_owner.as_str()))?;

    let decision = policy::can_transfer_ownership(&ctx, Some(&target));
    if ctx.is_active()
        && matches!(decision, AuthorizationResult::Denied(DenialReason::Suspended))
    {
        // The caller is active, so the inactive party is the target.
        return Err(OrgAuthError::invalid_state(
            "Ownership can only be transferred to an active member",
        )
        .with_details(ErrorDetails::new().with_entity("user", new_owner.as_str())));
    }
    state.authorizer.enforce(&ctx, "organization.transfer", decision)?;

    state
        .store()
        .transfer_ownership(&ctx.organization_id, &ctx.user_id, &new_owner)
        .await?;
    record_change("transfer", &ctx, &new_owner);

    Ok(Json(ApiResponse::success(TransferOwnershipResponse {
        previous_owner: ctx.user_id.clone(),
        new_owner,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_user_id() {
        assert_eq!(require_user_id("  bob ").unwrap(), UserId::new("bob"));
        assert_eq!(
            require_user_id("   ").unwrap_err().code(),
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn test_authorize_request_defaults_to_all() {
        let req: AuthorizeRequest =
            serde_json::from_str(r#"{"permissions":["post:view"]}"#).unwrap();
        assert_eq!(req.mode, CheckMode::All);

        let req: AuthorizeRequest =
            serde_json::from_str(r#"{"permissions":[],"mode":"any"}"#).unwrap();
        assert_eq!(req.mode, CheckMode::Any);
    }

    #[test]
    fn test_member_path_ids() {
        let path = MemberPath {
            org_id: "org1".into(),
            user_id: "bob".into(),
        };
        let (org, user) = path.ids();
        assert_eq!(org.as_str(), "org1");
        assert_eq!(user.as_str(), "bob");
    }
}
