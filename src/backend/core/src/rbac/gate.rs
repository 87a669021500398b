//! Presentation gate.
//!
//! Helps a client decide what to show. Nothing here is a security boundary:
//! every action a client can trigger is checked again by the request-handler
//! gate.

use serde::{Deserialize, Serialize};

use super::catalog::{Permission, Role};
use super::models::{MembershipContext, MembershipStatus, OrganizationId, UserId};
use super::policy::{self, AuthorizationResult};

/// Pick `children` when allowed, `fallback` otherwise.
pub fn render_if<T>(result: AuthorizationResult, children: T, fallback: T) -> T {
    if result.is_allowed() {
        children
    } else {
        fallback
    }
}

/// What the caller can do in one organization, for UI decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSummary {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: Role,
    pub status: MembershipStatus,
    /// Effective permissions: empty unless the membership is active.
    pub permissions: Vec<Permission>,
    /// Roles the caller can manage (suspend, remove, re-role, invite as).
    pub manageable_roles: Vec<Role>,
    pub is_owner: bool,
    pub is_admin_or_owner: bool,
}

impl PermissionSummary {
    pub fn for_context(ctx: &MembershipContext) -> Self {
        let permissions = Permission::ALL
            .into_iter()
            .filter(|p| policy::can_access(Some(ctx), *p).is_allowed())
            .collect();
        let manageable_roles = Role::ALL
            .into_iter()
            .filter(|r| policy::can_manage(ctx, *r).is_allowed())
            .collect();

        Self {
            organization_id: ctx.organization_id.clone(),
            user_id: ctx.user_id.clone(),
            role: ctx.role,
            status: ctx.status,
            permissions,
            manageable_roles,
            is_owner: policy::is_owner(Some(ctx)),
            is_admin_or_owner: policy::is_admin_or_owner(Some(ctx)),
        }
    }

    /// Rebuild a context from the summary, so a client can run the evaluator
    /// locally against what the server reported.
    pub fn context(&self) -> MembershipContext {
        MembershipContext::new(
            self.organization_id.clone(),
            self.user_id.clone(),
            self.role,
            self.status,
        )
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role, status: MembershipStatus) -> MembershipContext {
        MembershipContext::new(OrganizationId::new("org1"), UserId::new("u1"), role, status)
    }

    #[test]
    fn test_render_if() {
        let admin = ctx(Role::Admin, MembershipStatus::Active);
        let member = ctx(Role::Member, MembershipStatus::Active);

        let shown = render_if(
            policy::can_access(Some(&admin), Permission::MemberRemove),
            "remove button",
            "",
        );
        assert_eq!(shown, "remove button");

        let hidden = render_if(
            policy::can_access(Some(&member), Permission::MemberRemove),
            "remove button",
            "",
        );
        assert_eq!(hidden, "");
    }

    #[test]
    fn test_summary_for_admin() {
        let summary = PermissionSummary::for_context(&ctx(Role::Admin, MembershipStatus::Active));
        assert!(summary.can(Permission::MemberRemove));
        assert!(!summary.can(Permission::OrganizationDelete));
        assert_eq!(summary.manageable_roles, vec![Role::Member, Role::Viewer]);
        assert!(summary.is_admin_or_owner);
        assert!(!summary.is_owner);
    }

    #[test]
    fn test_summary_for_suspended_owner_is_empty() {
        let summary =
            PermissionSummary::for_context(&ctx(Role::Owner, MembershipStatus::Suspended));
        assert!(summary.permissions.is_empty());
        assert!(summary.manageable_roles.is_empty());
        assert!(!summary.is_owner);
        assert_eq!(summary.role, Role::Owner);
    }

    #[test]
    fn test_summary_serializes_tokens() {
        let summary = PermissionSummary::for_context(&ctx(Role::Viewer, MembershipStatus::Active));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["role"], "viewer");
        assert!(json["permissions"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("analytics:view")));
        assert_eq!(json["manageable_roles"], serde_json::json!([]));
    }

    #[test]
    fn test_summary_context_round_trip() {
        let original = ctx(Role::Member, MembershipStatus::Active);
        let summary = PermissionSummary::for_context(&original);
        assert_eq!(summary.context(), original);
    }
}
