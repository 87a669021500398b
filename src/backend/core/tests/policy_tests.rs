//! Tests for the role catalog and the authorization evaluator.
//!
//! Tests cover:
//! - Grant table contents per role
//! - Hierarchy monotonicity (a higher role never loses a permission)
//! - Fail-closed behavior for absent, suspended, and invited memberships
//! - Unknown tokens
//! - Member management across the whole role matrix
//! - Presentation gate consistency with the evaluator

use orgauth_core::rbac::catalog::{self, permissions_for_token};
use orgauth_core::rbac::{
    policy, render_if, AuthorizationResult, DenialReason, MembershipContext, MembershipStatus,
    OrganizationId, Permission, PermissionSummary, Role, UserId,
};

fn ctx(role: Role, status: MembershipStatus) -> MembershipContext {
    MembershipContext::new(OrganizationId::new("acme"), UserId::new("u1"), role, status)
}

fn active(role: Role) -> MembershipContext {
    ctx(role, MembershipStatus::Active)
}

fn tokens(role: Role) -> Vec<&'static str> {
    role.permissions().iter().map(Permission::as_str).collect()
}

// ============================================================================
// Catalog
// ============================================================================

#[test]
fn test_viewer_grants() {
    assert_eq!(
        tokens(Role::Viewer),
        vec![
            "organization:view",
            "member:view",
            "post:view",
            "project:view",
            "analytics:view",
            "reports:view",
        ]
    );
}

#[test]
fn test_member_adds_authoring() {
    let member = Role::Member.permissions();
    for permission in [
        Permission::PostCreate,
        Permission::PostUpdate,
        Permission::ProjectCreate,
        Permission::ProjectUpdate,
    ] {
        assert!(member.contains(permission), "member lacks {}", permission);
    }
    assert!(!member.contains(Permission::PostPublish));
    assert!(!member.contains(Permission::MemberInvite));
}

#[test]
fn test_only_owner_can_delete_or_transfer() {
    for role in Role::ALL {
        let expected = role == Role::Owner;
        assert_eq!(role.permissions().contains(Permission::OrganizationDelete), expected);
        assert_eq!(role.permissions().contains(Permission::OrganizationTransfer), expected);
    }
}

#[test]
fn test_owner_holds_every_permission() {
    assert_eq!(Role::Owner.permissions().len(), Permission::ALL.len());
}

#[test]
fn test_grants_are_monotonic_in_rank() {
    for higher in Role::ALL {
        for lower in Role::ALL {
            if higher.outranks(lower) {
                assert!(
                    higher.permissions().is_superset(lower.permissions()),
                    "{} should include every grant of {}",
                    higher,
                    lower
                );
            }
        }
    }
}

#[test]
fn test_every_permission_token_is_valid() {
    for permission in Permission::ALL {
        let token = permission.as_str();
        assert!(catalog::is_valid_permission(token));
        assert_eq!(token.parse::<Permission>().unwrap(), permission);
        assert_eq!(token, format!("{}:{}", permission.resource(), permission.action()));
    }
    assert_eq!(Permission::ALL.len(), 23);
}

#[test]
fn test_unknown_tokens() {
    assert!(!catalog::is_valid_role("superadmin"));
    assert!(!catalog::is_valid_permission("member:delete"));
    assert!(permissions_for_token("superadmin").is_empty());
    assert!("Owner".parse::<Role>().is_err());
}

// ============================================================================
// Fail-closed evaluation
// ============================================================================

#[test]
fn test_no_membership_denies_everything() {
    for permission in Permission::ALL {
        assert_eq!(
            policy::can_access(None, permission),
            AuthorizationResult::Denied(DenialReason::NoMembership)
        );
    }
    assert!(!policy::is_owner(None));
    assert!(!policy::is_admin_or_owner(None));
}

#[test]
fn test_inactive_memberships_deny_everything() {
    for status in [MembershipStatus::Suspended, MembershipStatus::Invited] {
        for role in Role::ALL {
            let ctx = ctx(role, status);
            for permission in Permission::ALL {
                assert_eq!(
                    policy::can_access(Some(&ctx), permission),
                    AuthorizationResult::Denied(DenialReason::Suspended),
                    "{} {} {}",
                    status,
                    role,
                    permission
                );
            }
            assert!(!policy::has_role(Some(&ctx), role));
            assert!(policy::can_manage(&ctx, Role::Viewer).is_denied());
        }
    }
}

#[test]
fn test_unknown_permission_token_is_missing_permission() {
    let owner = active(Role::Owner);
    assert_eq!(
        policy::can_access_token(Some(&owner), "billing:manage"),
        AuthorizationResult::Denied(DenialReason::MissingPermission)
    );
    assert_eq!(
        policy::can_access_all_tokens(Some(&owner), &["post:view", "nope"]),
        AuthorizationResult::Denied(DenialReason::MissingPermission)
    );
    assert!(policy::can_access_any_tokens(Some(&owner), &["nope", "post:view"]).is_allowed());
}

#[test]
fn test_access_matches_grant_table() {
    for role in Role::ALL {
        let ctx = active(role);
        for permission in Permission::ALL {
            assert_eq!(
                policy::can_access(Some(&ctx), permission).is_allowed(),
                role.permissions().contains(permission)
            );
        }
    }
}

// ============================================================================
// Member management matrix
// ============================================================================

#[test]
fn test_can_manage_matrix() {
    for acting in Role::ALL {
        for target in Role::ALL {
            let result = policy::can_manage(&active(acting), target);
            if acting.rank() > target.rank() {
                assert!(result.is_allowed(), "{} should manage {}", acting, target);
            } else {
                assert_eq!(
                    result,
                    AuthorizationResult::Denied(DenialReason::CannotManageEqualOrHigherRole),
                    "{} should not manage {}",
                    acting,
                    target
                );
            }
        }
    }
}

#[test]
fn test_management_needs_permission_first() {
    // A member outranks a viewer but holds no member:* management grant.
    let member = active(Role::Member);
    assert_eq!(
        policy::can_manage_with(&member, Permission::MemberRemove, Role::Viewer),
        AuthorizationResult::Denied(DenialReason::MissingPermission)
    );
    assert_eq!(
        policy::can_invite(&member, Role::Viewer),
        AuthorizationResult::Denied(DenialReason::MissingPermission)
    );
}

#[test]
fn test_nobody_can_invite_an_owner() {
    for role in Role::ALL {
        assert!(policy::can_invite(&active(role), Role::Owner).is_denied());
    }
}

#[test]
fn test_owner_continuity() {
    let owner = active(Role::Owner);
    assert_eq!(
        policy::can_leave(&owner, 1),
        AuthorizationResult::Denied(DenialReason::LastOwner)
    );
    assert!(policy::can_leave(&owner, 2).is_allowed());
    assert!(policy::can_change_own_role(&owner, Role::Admin, 2).is_allowed());
    assert_eq!(
        policy::can_change_own_role(&owner, Role::Admin, 1),
        AuthorizationResult::Denied(DenialReason::LastOwner)
    );
}

// ============================================================================
// Presentation gate
// ============================================================================

#[test]
fn test_summary_agrees_with_evaluator() {
    for role in Role::ALL {
        for status in [
            MembershipStatus::Active,
            MembershipStatus::Suspended,
            MembershipStatus::Invited,
        ] {
            let ctx = ctx(role, status);
            let summary = PermissionSummary::for_context(&ctx);
            for permission in Permission::ALL {
                assert_eq!(
                    summary.can(permission),
                    policy::can_access(Some(&ctx), permission).is_allowed()
                );
            }
            assert_eq!(summary.context(), ctx);
        }
    }
}

#[test]
fn test_render_if_follows_decision() {
    let viewer = active(Role::Viewer);
    let shown = render_if(
        policy::can_access(Some(&viewer), Permission::MemberInvite),
        "invite-button",
        "",
    );
    assert_eq!(shown, "");
}
