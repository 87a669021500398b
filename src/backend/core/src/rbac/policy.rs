//! Authorization evaluator.
//!
//! Answers "may this membership do X?" for permissions, role requirements and
//! member-management actions. Every function here is pure: the caller resolves
//! the [`MembershipContext`] and passes it in, and the evaluator neither logs
//! nor performs I/O. Denials are ordinary return values carrying a
//! [`DenialReason`].
//!
//! Check order is fixed: membership presence, then status, then the
//! role/permission rule. A suspended owner is therefore denied with
//! [`DenialReason::Suspended`] before any grant is consulted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::catalog::{Permission, Role};
use super::models::MembershipContext;

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Why an authorization check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    #[error("no membership in organization")]
    NoMembership,

    #[error("membership is not active")]
    Suspended,

    #[error("role is not sufficient")]
    InsufficientRole,

    #[error("permission not granted")]
    MissingPermission,

    #[error("cannot manage a member with an equal or higher role")]
    CannotManageEqualOrHigherRole,

    #[error("organization must keep at least one active owner")]
    LastOwner,
}

impl DenialReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMembership => "no_membership",
            Self::Suspended => "suspended",
            Self::InsufficientRole => "insufficient_role",
            Self::MissingPermission => "missing_permission",
            Self::CannotManageEqualOrHigherRole => "cannot_manage_equal_or_higher_role",
            Self::LastOwner => "last_owner",
        }
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationResult {
    Allowed,
    Denied(DenialReason),
}

impl AuthorizationResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    pub fn reason(&self) -> Option<DenialReason> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(*reason),
        }
    }

    /// `Ok(())` if allowed, `Err(reason)` if denied.
    pub fn into_result(self) -> Result<(), DenialReason> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(reason) => Err(reason),
        }
    }

    fn from_check(allowed: bool, reason: DenialReason) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::Denied(reason)
        }
    }
}

impl From<Result<(), DenialReason>> for AuthorizationResult {
    fn from(result: Result<(), DenialReason>) -> Self {
        match result {
            Ok(()) => Self::Allowed,
            Err(reason) => Self::Denied(reason),
        }
    }
}

/// Serialized as `{ "allowed": bool, "reason": "..."? }`.
impl Serialize for AuthorizationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            allowed: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<DenialReason>,
        }

        Wire {
            allowed: self.is_allowed(),
            reason: self.reason(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AuthorizationResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            allowed: bool,
            #[serde(default)]
            reason: Option<DenialReason>,
        }

        let wire = Wire::deserialize(deserializer)?;
        Ok(match (wire.allowed, wire.reason) {
            (true, _) => Self::Allowed,
            // A denial without a reason is still a denial.
            (false, reason) => Self::Denied(reason.unwrap_or(DenialReason::MissingPermission)),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership gating
// ═══════════════════════════════════════════════════════════════════════════════

/// Presence and status gate shared by every check.
fn active(ctx: Option<&MembershipContext>) -> Result<&MembershipContext, DenialReason> {
    let ctx = ctx.ok_or(DenialReason::NoMembership)?;
    if ctx.is_active() {
        Ok(ctx)
    } else {
        Err(DenialReason::Suspended)
    }
}

fn granted(ctx: &MembershipContext, permission: Permission) -> bool {
    ctx.role.permissions().contains(permission)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission checks
// ═══════════════════════════════════════════════════════════════════════════════

/// Check a single permission.
pub fn can_access(ctx: Option<&MembershipContext>, permission: Permission) -> AuthorizationResult {
    check_one(ctx, Some(permission))
}

/// Check a permission given as a raw token. Unknown tokens are denied with
/// [`DenialReason::MissingPermission`].
pub fn can_access_token(ctx: Option<&MembershipContext>, token: &str) -> AuthorizationResult {
    check_one(ctx, Permission::parse(token))
}

fn check_one(ctx: Option<&MembershipContext>, permission: Option<Permission>) -> AuthorizationResult {
    match active(ctx) {
        Ok(ctx) => AuthorizationResult::from_check(
            permission.is_some_and(|p| granted(ctx, p)),
            DenialReason::MissingPermission,
        ),
        Err(reason) => AuthorizationResult::Denied(reason),
    }
}

/// AND over `permissions`, evaluated in input order.
///
/// Returns the first failing result. An empty list is allowed for an active
/// membership and denied with the membership reason otherwise.
pub fn can_access_all(
    ctx: Option<&MembershipContext>,
    permissions: &[Permission],
) -> AuthorizationResult {
    check_all(ctx, permissions.iter().map(|p| Some(*p)))
}

/// Token variant of [`can_access_all`]; any unknown token fails the check.
pub fn can_access_all_tokens<T: AsRef<str>>(
    ctx: Option<&MembershipContext>,
    tokens: &[T],
) -> AuthorizationResult {
    check_all(ctx, tokens.iter().map(|t| Permission::parse(t.as_ref())))
}

fn check_all<I>(ctx: Option<&MembershipContext>, permissions: I) -> AuthorizationResult
where
    I: IntoIterator<Item = Option<Permission>>,
{
    if let Err(reason) = active(ctx) {
        return AuthorizationResult::Denied(reason);
    }
    for permission in permissions {
        let result = check_one(ctx, permission);
        if result.is_denied() {
            return result;
        }
    }
    AuthorizationResult::Allowed
}

/// OR over `permissions`.
///
/// When nothing passes, the result is the denial produced by the LAST
/// permission checked. An empty list is denied with
/// [`DenialReason::MissingPermission`] (or the membership reason, if the
/// membership itself fails).
pub fn can_access_any(
    ctx: Option<&MembershipContext>,
    permissions: &[Permission],
) -> AuthorizationResult {
    check_any(ctx, permissions.iter().map(|p| Some(*p)))
}

/// Token variant of [`can_access_any`]; unknown tokens never pass.
pub fn can_access_any_tokens<T: AsRef<str>>(
    ctx: Option<&MembershipContext>,
    tokens: &[T],
) -> AuthorizationResult {
    check_any(ctx, tokens.iter().map(|t| Permission::parse(t.as_ref())))
}

fn check_any<I>(ctx: Option<&MembershipContext>, permissions: I) -> AuthorizationResult
where
    I: IntoIterator<Item = Option<Permission>>,
{
    let mut last = match active(ctx) {
        Ok(_) => AuthorizationResult::Denied(DenialReason::MissingPermission),
        Err(reason) => return AuthorizationResult::Denied(reason),
    };
    for permission in permissions {
        last = check_one(ctx, permission);
        if last.is_allowed() {
            return last;
        }
    }
    last
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role checks
// ═══════════════════════════════════════════════════════════════════════════════

/// Exact role match on an active membership. Not hierarchical.
pub fn has_role(ctx: Option<&MembershipContext>, role: Role) -> bool {
    active(ctx).is_ok_and(|ctx| ctx.role == role)
}

pub fn is_owner(ctx: Option<&MembershipContext>) -> bool {
    has_role(ctx, Role::Owner)
}

pub fn is_admin_or_owner(ctx: Option<&MembershipContext>) -> bool {
    has_role(ctx, Role::Owner) || has_role(ctx, Role::Admin)
}

/// Hierarchical minimum-role requirement.
pub fn require_role(ctx: Option<&MembershipContext>, minimum: Role) -> AuthorizationResult {
    match active(ctx) {
        Ok(ctx) => AuthorizationResult::from_check(
            ctx.role.rank() >= minimum.rank(),
            DenialReason::InsufficientRole,
        ),
        Err(reason) => AuthorizationResult::Denied(reason),
    }
}

/// Allowed-roles list requirement (exact membership in `allowed`).
pub fn require_any_role(ctx: Option<&MembershipContext>, allowed: &[Role]) -> AuthorizationResult {
    match active(ctx) {
        Ok(ctx) => AuthorizationResult::from_check(
            allowed.contains(&ctx.role),
            DenialReason::InsufficientRole,
        ),
        Err(reason) => AuthorizationResult::Denied(reason),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Member management
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether `acting` may suspend, remove or re-role a member holding
/// `target_role`. The acting role must rank strictly above the target.
pub fn can_manage(acting: &MembershipContext, target_role: Role) -> AuthorizationResult {
    match active(Some(acting)) {
        Ok(acting) => AuthorizationResult::from_check(
            acting.role.outranks(target_role),
            DenialReason::CannotManageEqualOrHigherRole,
        ),
        Err(reason) => AuthorizationResult::Denied(reason),
    }
}

/// Management action gated by a permission: the permission first, then the
/// hierarchy rule.
pub fn can_manage_with(
    acting: &MembershipContext,
    permission: Permission,
    target_role: Role,
) -> AuthorizationResult {
    can_access(Some(acting), permission)
        .into_result()
        .and_then(|()| can_manage(acting, target_role).into_result())
        .into()
}

/// Inviting someone requires `member:invite` and a role strictly below the
/// inviter's own.
pub fn can_invite(acting: &MembershipContext, role: Role) -> AuthorizationResult {
    can_manage_with(acting, Permission::MemberInvite, role)
}

/// Changing another member's role: `member:update_role`, authority over the
/// member's current role, and authority over the role being assigned.
pub fn can_assign_role(
    acting: &MembershipContext,
    target_current: Role,
    new_role: Role,
) -> AuthorizationResult {
    can_manage_with(acting, Permission::MemberUpdateRole, target_current)
        .into_result()
        .and_then(|()| can_manage(acting, new_role).into_result())
        .into()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Owner continuity
// ═══════════════════════════════════════════════════════════════════════════════
//
// An organization always keeps at least one active owner. Other members can
// never act on an owner (nobody outranks one), so the only ways to lose an
// owner are self-service: leaving, self-demotion, or ownership transfer.

/// Whether `ctx` may leave the organization. `active_owner_count` is the
/// number of active owners including `ctx` itself when it is one.
pub fn can_leave(ctx: &MembershipContext, active_owner_count: usize) -> AuthorizationResult {
    match active(Some(ctx)) {
        Ok(ctx) => AuthorizationResult::from_check(
            ctx.role != Role::Owner || active_owner_count > 1,
            DenialReason::LastOwner,
        ),
        Err(reason) => AuthorizationResult::Denied(reason),
    }
}

/// Whether `ctx` may change its own role to `new_role`. Only demotion is
/// possible; the last active owner may not demote themselves.
pub fn can_change_own_role(
    ctx: &MembershipContext,
    new_role: Role,
    active_owner_count: usize,
) -> AuthorizationResult {
    let ctx = match active(Some(ctx)) {
        Ok(ctx) => ctx,
        Err(reason) => return AuthorizationResult::Denied(reason),
    };
    if !ctx.role.outranks(new_role) {
        return AuthorizationResult::Denied(DenialReason::CannotManageEqualOrHigherRole);
    }
    AuthorizationResult::from_check(
        ctx.role != Role::Owner || active_owner_count > 1,
        DenialReason::LastOwner,
    )
}

/// Whether `acting` may hand ownership to `target`.
///
/// Requires `organization:transfer`; the target must be an active member of
/// the same organization who is not already an owner.
pub fn can_transfer_ownership(
    acting: &MembershipContext,
    target: Option<&MembershipContext>,
) -> AuthorizationResult {
    if let Err(reason) = can_access(Some(acting), Permission::OrganizationTransfer).into_result() {
        return AuthorizationResult::Denied(reason);
    }
    let target = match target {
        Some(t) if t.organization_id == acting.organization_id => t,
        _ => return AuthorizationResult::Denied(DenialReason::NoMembership),
    };
    if !target.is_active() {
        return AuthorizationResult::Denied(DenialReason::Suspended);
    }
    AuthorizationResult::from_check(
        acting.role.outranks(target.role),
        DenialReason::CannotManageEqualOrHigherRole,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
