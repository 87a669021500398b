//! Enforcement-side authorization: resolve, evaluate, record, reject.
//!
//! The evaluator in [`policy`](super::policy) is pure. This module is where a
//! decision meets the outside world: the membership context is looked up, the
//! outcome is counted and denials are logged, and a denial is turned into an
//! [`OrgAuthError`] suitable for an HTTP response.

use metrics::counter;
use std::fmt;
use tracing::{debug, warn};

use super::catalog::{Permission, Role};
use super::context::MembershipContextProvider;
use super::models::{MembershipContext, MembershipRecord, OrganizationId, UserId};
use super::policy::{self, AuthorizationResult, DenialReason};
use crate::error::{OrgAuthError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Requirement
// ═══════════════════════════════════════════════════════════════════════════════

/// What a route (or an action within a handler) requires of the caller's
/// membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any membership, whatever its status. Used for self-service routes such
    /// as reading one's own summary or accepting an invitation.
    Membership,
    /// An active membership, no particular permission.
    ActiveMembership,
    /// A single catalog permission.
    Permission(Permission),
    /// Hierarchical minimum role.
    MinimumRole(Role),
}

impl Requirement {
    /// Evaluate against a resolved context.
    pub fn evaluate(&self, ctx: Option<&MembershipContext>) -> AuthorizationResult {
        match self {
            Self::Membership => match ctx {
                Some(_) => AuthorizationResult::Allowed,
                None => AuthorizationResult::Denied(DenialReason::NoMembership),
            },
            Self::ActiveMembership => policy::can_access_all(ctx, &[]),
            Self::Permission(permission) => policy::can_access(ctx, *permission),
            Self::MinimumRole(role) => policy::require_role(ctx, *role),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Membership => f.write_str("membership"),
            Self::ActiveMembership => f.write_str("active_membership"),
            Self::Permission(p) => write!(f, "permission:{}", p),
            Self::MinimumRole(r) => write!(f, "role>={}", r),
        }
    }
}

impl From<Permission> for Requirement {
    fn from(permission: Permission) -> Self {
        Self::Permission(permission)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authorizer
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves membership contexts and enforces decisions.
#[derive(Clone)]
pub struct Authorizer {
    provider: MembershipContextProvider,
}

impl Authorizer {
    pub fn new(provider: MembershipContextProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &MembershipContextProvider {
        &self.provider
    }

    /// Resolve the caller's context. Store failures surface as faults.
    pub async fn resolve(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<MembershipContext>> {
        Ok(self.provider.resolve(user_id, organization_id).await?)
    }

    /// Resolve and check `requirement` in one step.
    ///
    /// On success the resolved context is returned so the caller can make
    /// further, target-dependent checks without a second lookup.
    pub async fn authorize(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        requirement: &Requirement,
    ) -> Result<MembershipContext> {
        let ctx = self.resolve(user_id, organization_id).await?;
        let result = requirement.evaluate(ctx.as_ref());
        record(user_id, organization_id, &requirement.to_string(), result)?;

        ctx.ok_or_else(|| OrgAuthError::from(DenialReason::NoMembership))
    }

    /// Enforce an already-computed decision for `ctx`, recording it under
    /// `action`.
    pub fn enforce(
        &self,
        ctx: &MembershipContext,
        action: &str,
        result: AuthorizationResult,
    ) -> Result<()> {
        record(&ctx.user_id, &ctx.organization_id, action, result)
    }

    /// Load the record a management action targets.
    ///
    /// A missing target is reported as not found rather than as a denial: the
    /// caller has already proven membership of the organization.
    pub async fn target(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<MembershipRecord> {
        self.provider
            .store()
            .get_membership(user_id, organization_id)
            .await?
            .ok_or_else(|| OrgAuthError::membership_not_found(user_id.as_str()))
    }
}

/// Count the decision, log denials, and convert them into errors.
fn record(
    user_id: &UserId,
    organization_id: &OrganizationId,
    action: &str,
    result: AuthorizationResult,
) -> Result<()> {
    match result {
        AuthorizationResult::Allowed => {
            counter!(
                "orgauth_authz_decisions_total",
                "outcome" => "allowed",
                "reason" => "none",
            )
            .increment(1);
            debug!(
                user_id = %user_id,
                org_id = %organization_id,
                action = action,
                "Authorization allowed"
            );
            Ok(())
        }
        AuthorizationResult::Denied(reason) => {
            counter!(
                "orgauth_authz_decisions_total",
                "outcome" => "denied",
                "reason" => reason.as_str(),
            )
            .increment(1);
            warn!(
                user_id = %user_id,
                org_id = %organization_id,
                action = action,
                reason = reason.as_str(),
                "Authorization denied"
            );
            Err(OrgAuthError::from(reason))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rbac::context::InMemoryMembershipStore;
    use crate::rbac::models::MembershipStatus;
    use std::sync::Arc;

    fn org() -> OrganizationId {
        OrganizationId::new("org1")
    }

    fn authorizer() -> Authorizer {
        let store = InMemoryMembershipStore::new();
        store.seed(MembershipRecord::active(UserId::new("alice"), org(), Role::Owner));
        store.seed(MembershipRecord::active(UserId::new("mia"), org(), Role::Member));
        store.seed(
            MembershipRecord::active(UserId::new("sam"), org(), Role::Admin)
                .with_status(MembershipStatus::Suspended),
        );
        Authorizer::new(MembershipContextProvider::new(Arc::new(store)))
    }

    #[test]
    fn test_requirement_evaluate() {
        let invited = MembershipContext::new(
            org(),
            UserId::new("ivy"),
            Role::Viewer,
            MembershipStatus::Invited,
        );
        assert!(Requirement::Membership.evaluate(Some(&invited)).is_allowed());
        assert_eq!(
            Requirement::ActiveMembership.evaluate(Some(&invited)),
            AuthorizationResult::Denied(DenialReason::Suspended)
        );
        assert_eq!(
            Requirement::Membership.evaluate(None),
            AuthorizationResult::Denied(DenialReason::NoMembership)
        );
    }

    #[tokio::test]
    async fn test_authorize_allowed_returns_context() {
        let ctx = authorizer()
            .authorize(
                &UserId::new("alice"),
                &org(),
                &Requirement::Permission(Permission::MemberRemove),
            )
            .await
            .unwrap();
        assert_eq!(ctx.role, Role::Owner);
    }

    #[tokio::test]
    async fn test_authorize_denials() {
        let authz = authorizer();

        let err = authz
            .authorize(&UserId::new("mia"), &org(), &Permission::MemberRemove.into())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingPermission);

        let err = authz
            .authorize(&UserId::new("sam"), &org(), &Permission::MemberView.into())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MembershipInactive);

        let err = authz
            .authorize(
                &UserId::new("alice"),
                &OrganizationId::new("other"),
                &Requirement::Membership,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrganizationNotAccessible);
    }

    #[tokio::test]
    async fn test_minimum_role() {
        let err = authorizer()
            .authorize(&UserId::new("mia"), &org(), &Requirement::MinimumRole(Role::Admin))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientRole);
    }

    #[tokio::test]
    async fn test_enforce_and_target() {
        let authz = authorizer();
        let alice = authz
            .resolve(&UserId::new("alice"), &org())
            .await
            .unwrap()
            .unwrap();

        let target = authz.target(&org(), &UserId::new("mia")).await.unwrap();
        assert!(authz
            .enforce(&alice, "member.suspend", policy::can_manage(&alice, target.role))
            .is_ok());

        let err = authz.target(&org(), &UserId::new("nobody")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MembershipNotFound);
    }
}
