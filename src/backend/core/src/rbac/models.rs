//! RBAC data models: identifiers, membership records, and the per-request
//! membership context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::catalog::Role;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Strongly-typed organization identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(pub String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrganizationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrganizationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership status
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a membership.
///
/// Transitions (`invited -> active`, `active <-> suspended`) are performed by
/// the membership store; the evaluator only observes the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Suspended,
    Invited,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown membership status: {0}")]
pub struct UnknownStatus(pub String);

impl MembershipStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Invited => "invited",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "invited" => Ok(Self::Invited),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership record (persisted)
// ═══════════════════════════════════════════════════════════════════════════════

/// A persisted `(user, organization)` membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub role: Role,
    pub status: MembershipStatus,
    /// Who sent the invitation, if the membership started as one.
    pub invited_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipRecord {
    /// A new active membership.
    pub fn active(user_id: UserId, organization_id: OrganizationId, role: Role) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            organization_id,
            role,
            status: MembershipStatus::Active,
            invited_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A pending invitation.
    pub fn invitation(
        user_id: UserId,
        organization_id: OrganizationId,
        role: Role,
        invited_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            organization_id,
            role,
            status: MembershipStatus::Invited,
            invited_by: Some(invited_by),
            created_at: now,
            updated_at: now,
        }
    }

    /// Override the status (builder style).
    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active_owner(&self) -> bool {
        self.role == Role::Owner && self.status == MembershipStatus::Active
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership context (per request)
// ═══════════════════════════════════════════════════════════════════════════════

/// The caller's resolved standing within one organization.
///
/// Built fresh for every request by the
/// [`MembershipContextProvider`](super::context::MembershipContextProvider)
/// and passed explicitly to every evaluator call. Never cache one across
/// requests: role and status can change between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipContext {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: Role,
    pub status: MembershipStatus,
}

impl MembershipContext {
    pub fn new(
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
        status: MembershipStatus,
    ) -> Self {
        Self {
            organization_id,
            user_id,
            role,
            status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

impl From<MembershipRecord> for MembershipContext {
    fn from(record: MembershipRecord) -> Self {
        Self {
            organization_id: record.organization_id,
            user_id: record.user_id,
            role: record.role,
            status: record.status,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("active".parse::<MembershipStatus>(), Ok(MembershipStatus::Active));
        assert_eq!("invited".parse::<MembershipStatus>(), Ok(MembershipStatus::Invited));
        assert!("banned".parse::<MembershipStatus>().is_err());
        assert!("Active".parse::<MembershipStatus>().is_err());
    }

    #[test]
    fn test_invitation_record() {
        let record = MembershipRecord::invitation(
            UserId::new("bob"),
            OrganizationId::new("org1"),
            Role::Member,
            UserId::new("alice"),
        );
        assert_eq!(record.status, MembershipStatus::Invited);
        assert_eq!(record.invited_by, Some(UserId::new("alice")));
        assert!(!record.is_active_owner());
    }

    #[test]
    fn test_context_from_record() {
        let record = MembershipRecord::active(
            UserId::new("alice"),
            OrganizationId::new("org1"),
            Role::Owner,
        );
        assert!(record.is_active_owner());

        let ctx = MembershipContext::from(record);
        assert_eq!(ctx.user_id.as_str(), "alice");
        assert_eq!(ctx.organization_id.as_str(), "org1");
        assert_eq!(ctx.role, Role::Owner);
        assert!(ctx.is_active());
    }

    #[test]
    fn test_suspended_owner_is_not_active_owner() {
        let record = MembershipRecord::active(
            UserId::new("alice"),
            OrganizationId::new("org1"),
            Role::Owner,
        )
        .with_status(MembershipStatus::Suspended);
        assert!(!record.is_active_owner());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId::new("u-1")).unwrap();
        assert_eq!(json, "\"u-1\"");
    }
}
