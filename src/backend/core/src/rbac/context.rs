//! Membership store contract and the per-request context provider.
//!
//! The provider performs exactly one point lookup per call and never caches:
//! a stale role or status is a privilege-escalation window.

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use super::catalog::Role;
use super::models::{
    MembershipContext, MembershipRecord, MembershipStatus, OrganizationId, UserId,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures from a membership store.
///
/// All of these are faults, never authorization outcomes. Callers must not
/// translate them into "allow", nor silently into "deny".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt membership record: {field}={value}")]
    CorruptRecord { field: &'static str, value: String },

    #[error("Membership already exists: user={user}, org={org}")]
    AlreadyExists { user: String, org: String },

    #[error("Membership not found: user={user}, org={org}")]
    NotFound { user: String, org: String },

    #[error("Change would leave organization {0} without an active owner")]
    WouldOrphanOrganization(String),

    #[error("Ownership transfer rejected in organization {org}: {reason}")]
    TransferRejected { org: String, reason: &'static str },
}

impl StoreError {
    pub(crate) fn not_found(user: &UserId, org: &OrganizationId) -> Self {
        Self::NotFound {
            user: user.to_string(),
            org: org.to_string(),
        }
    }
}

/// Refuse a change that takes `before` from active owner to anything else
/// while it is the organization's only active owner. Callers must hold
/// whatever lock makes `active_owners` current.
pub(crate) fn ensure_owner_remains(
    active_owners: usize,
    before: &MembershipRecord,
    after_is_active_owner: bool,
) -> Result<(), StoreError> {
    if before.is_active_owner() && !after_is_active_owner && active_owners <= 1 {
        return Err(StoreError::WouldOrphanOrganization(
            before.organization_id.to_string(),
        ));
    }
    Ok(())
}

/// Re-check a transfer against locked records: `from` must still be an
/// active owner and `to` an active non-owner member.
pub(crate) fn ensure_transferable(
    from: &MembershipRecord,
    to: &MembershipRecord,
) -> Result<(), StoreError> {
    let reason = if !from.is_active_owner() {
        "current owner is no longer an active owner"
    } else if from.user_id == to.user_id {
        "new owner is the current owner"
    } else if to.status != MembershipStatus::Active {
        "new owner is not an active member"
    } else if to.role == Role::Owner {
        "new owner is already an owner"
    } else {
        return Ok(());
    };
    Err(StoreError::TransferRejected {
        org: from.organization_id.to_string(),
        reason,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store contract
// ═══════════════════════════════════════════════════════════════════════════════

/// Persistent membership records keyed by `(user_id, organization_id)`.
///
/// Mutations that could drop an organization's last active owner must refuse
/// atomically with [`StoreError::WouldOrphanOrganization`], and a transfer
/// must re-check both parties under the same lock as its write
/// ([`StoreError::TransferRejected`]). The evaluator checks the same rules up
/// front; the store closes the race.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Point lookup of one membership.
    async fn get_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<MembershipRecord>, StoreError>;

    /// All memberships of an organization, ordered by creation time.
    async fn list_memberships(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<MembershipRecord>, StoreError>;

    /// Insert a new membership; fails if one exists for the pair.
    async fn insert_membership(&self, record: MembershipRecord) -> Result<(), StoreError>;

    async fn update_role(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        role: Role,
    ) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        status: MembershipStatus,
    ) -> Result<(), StoreError>;

    async fn remove_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<(), StoreError>;

    async fn count_active_owners(&self, organization_id: &OrganizationId)
        -> Result<usize, StoreError>;

    /// Promote `to` to owner and demote `from` to admin in one step.
    async fn transfer_ownership(
        &self,
        organization_id: &OrganizationId,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Context provider
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves a caller's [`MembershipContext`] from the store.
#[derive(Clone)]
pub struct MembershipContextProvider {
    store: Arc<dyn MembershipStore>,
}

impl MembershipContextProvider {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Live lookup. `Ok(None)` means no membership in that organization.
    pub async fn resolve(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<MembershipContext>, StoreError> {
        match self.store.get_membership(user_id, organization_id).await {
            Ok(Some(record)) => {
                counter!("orgauth_membership_lookups_total", "result" => "found").increment(1);
                debug!(
                    user_id = %user_id,
                    org_id = %organization_id,
                    role = %record.role,
                    status = %record.status,
                    "Resolved membership"
                );
                Ok(Some(MembershipContext::from(record)))
            }
            Ok(None) => {
                counter!("orgauth_membership_lookups_total", "result" => "absent").increment(1);
                Ok(None)
            }
            Err(e) => {
                counter!("orgauth_membership_lookups_total", "result" => "error").increment(1);
                error!(
                    user_id = %user_id,
                    org_id = %organization_id,
                    error = %e,
                    "Membership lookup failed"
                );
                Err(e)
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════════════════════════

/// Thread-safe in-memory store for tests and local development.
///
/// Records are sharded per organization, so every mutation holds that
/// organization's entry lock and owner-count checks are atomic with the write.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipStore {
    organizations: Arc<DashMap<OrganizationId, HashMap<UserId, MembershipRecord>>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, replacing any existing one for the pair.
    pub fn seed(&self, record: MembershipRecord) {
        self.organizations
            .entry(record.organization_id.clone())
            .or_default()
            .insert(record.user_id.clone(), record);
    }

    fn active_owners(members: &HashMap<UserId, MembershipRecord>) -> usize {
        members.values().filter(|m| m.is_active_owner()).count()
    }

    /// Apply `change` to one record, refusing if the org would lose its last
    /// active owner.
    fn mutate<F>(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        change: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(&mut MembershipRecord),
    {
        let mut members = self
            .organizations
            .get_mut(organization_id)
            .ok_or_else(|| StoreError::not_found(user_id, organization_id))?;

        let owners = Self::active_owners(&members);
        let record = members
            .get(user_id)
            .ok_or_else(|| StoreError::not_found(user_id, organization_id))?;

        let mut updated = record.clone();
        change(&mut updated);
        updated.updated_at = chrono::Utc::now();
        ensure_owner_remains(owners, record, updated.is_active_owner())?;

        members.insert(user_id.clone(), updated);
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn get_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<MembershipRecord>, StoreError> {
        Ok(self
            .organizations
            .get(organization_id)
            .and_then(|members| members.get(user_id).cloned()))
    }

    async fn list_memberships(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        let mut records: Vec<MembershipRecord> = self
            .organizations
            .get(organization_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.as_str().cmp(b.user_id.as_str()))
        });
        Ok(records)
    }

    async fn insert_membership(&self, record: MembershipRecord) -> Result<(), StoreError> {
        let mut members = self
            .organizations
            .entry(record.organization_id.clone())
            .or_default();
        if members.contains_key(&record.user_id) {
            return Err(StoreError::AlreadyExists {
                user: record.user_id.to_string(),
                org: record.organization_id.to_string(),
            });
        }
        members.insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn update_role(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        role: Role,
    ) -> Result<(), StoreError> {
        self.mutate(user_id, organization_id, |record| record.role = role)
    }

    async fn update_status(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        status: MembershipStatus,
    ) -> Result<(), StoreError> {
        self.mutate(user_id, organization_id, |record| record.status = status)
    }

    async fn remove_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<(), StoreError> {
        let mut members = self
            .organizations
            .get_mut(organization_id)
            .ok_or_else(|| StoreError::not_found(user_id, organization_id))?;

        let record = members
            .get(user_id)
            .ok_or_else(|| StoreError::not_found(user_id, organization_id))?;
        ensure_owner_remains(Self::active_owners(&members), record, false)?;

        members.remove(user_id);
        Ok(())
    }

    async fn count_active_owners(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<usize, StoreError> {
        Ok(self
            .organizations
            .get(organization_id)
            .map(|members| Self::active_owners(&members))
            .unwrap_or(0))
    }

    async fn transfer_ownership(
        &self,
        organization_id: &OrganizationId,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), StoreError> {
        let mut members = self
            .organizations
            .get_mut(organization_id)
            .ok_or_else(|| StoreError::not_found(to, organization_id))?;
        let current = members
            .get(from)
            .ok_or_else(|| StoreError::not_found(from, organization_id))?;
        let target = members
            .get(to)
            .ok_or_else(|| StoreError::not_found(to, organization_id))?;
        ensure_transferable(current, target)?;

        let now = chrono::Utc::now();
        for (user, role) in [(to, Role::Owner), (from, Role::Admin)] {
            if let Some(record) = members.get_mut(user) {
                record.role = role;
                record.updated_at = now;
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrganizationId {
        OrganizationId::new("org1")
    }

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    fn seeded() -> InMemoryMembershipStore {
        let store = InMemoryMembershipStore::new();
        store.seed(MembershipRecord::active(user("alice"), org(), Role::Owner));
        store.seed(MembershipRecord::active(user("bob"), org(), Role::Admin));
        store.seed(
            MembershipRecord::active(user("carol"), org(), Role::Member)
                .with_status(MembershipStatus::Suspended),
        );
        store
    }

    #[tokio::test]
    async fn test_resolve_found() {
        let provider = MembershipContextProvider::new(Arc::new(seeded()));
        let ctx = provider.resolve(&user("bob"), &org()).await.unwrap().unwrap();
        assert_eq!(ctx.role, Role::Admin);
        assert_eq!(ctx.status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn test_resolve_absent_and_cross_tenant() {
        let provider = MembershipContextProvider::new(Arc::new(seeded()));
        assert!(provider.resolve(&user("zoe"), &org()).await.unwrap().is_none());
        assert!(provider
            .resolve(&user("alice"), &OrganizationId::new("org2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_resolve_reads_live_data() {
        let store = Arc::new(seeded());
        let provider = MembershipContextProvider::new(store.clone());

        let before = provider.resolve(&user("bob"), &org()).await.unwrap().unwrap();
        assert!(before.is_active());

        store
            .update_status(&user("bob"), &org(), MembershipStatus::Suspended)
            .await
            .unwrap();

        let after = provider.resolve(&user("bob"), &org()).await.unwrap().unwrap();
        assert_eq!(after.status, MembershipStatus::Suspended);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = seeded();
        let err = store
            .insert_membership(MembershipRecord::active(user("bob"), org(), Role::Viewer))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_last_owner_protected() {
        let store = seeded();
        assert_eq!(store.count_active_owners(&org()).await.unwrap(), 1);

        let err = store.remove_membership(&user("alice"), &org()).await.unwrap_err();
        assert!(matches!(err, StoreError::WouldOrphanOrganization(_)));

        let err = store
            .update_role(&user("alice"), &org(), Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WouldOrphanOrganization(_)));

        let err = store
            .update_status(&user("alice"), &org(), MembershipStatus::Suspended)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WouldOrphanOrganization(_)));
    }

    #[tokio::test]
    async fn test_second_owner_may_leave() {
        let store = seeded();
        store.update_role(&user("bob"), &org(), Role::Owner).await.unwrap();
        assert_eq!(store.count_active_owners(&org()).await.unwrap(), 2);

        store.remove_membership(&user("alice"), &org()).await.unwrap();
        assert_eq!(store.count_active_owners(&org()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transfer_ownership() {
        let store = seeded();
        store
            .transfer_ownership(&org(), &user("alice"), &user("bob"))
            .await
            .unwrap();

        let alice = store.get_membership(&user("alice"), &org()).await.unwrap().unwrap();
        let bob = store.get_membership(&user("bob"), &org()).await.unwrap().unwrap();
        assert_eq!(alice.role, Role::Admin);
        assert_eq!(bob.role, Role::Owner);
        assert_eq!(store.count_active_owners(&org()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transfer_rechecks_target_under_lock() {
        let store = seeded();
        store.seed(MembershipRecord::active(user("mia"), org(), Role::Member));

        // Target suspended after the caller's checks but before the write.
        store
            .update_status(&user("mia"), &org(), MembershipStatus::Suspended)
            .await
            .unwrap();
        let err = store
            .transfer_ownership(&org(), &user("alice"), &user("mia"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TransferRejected { .. }));

        let alice = store.get_membership(&user("alice"), &org()).await.unwrap().unwrap();
        let mia = store.get_membership(&user("mia"), &org()).await.unwrap().unwrap();
        assert_eq!(alice.role, Role::Owner);
        assert_eq!(mia.role, Role::Member);
        assert_eq!(store.count_active_owners(&org()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transfer_requires_active_owner_source() {
        let store = seeded();
        // bob is an admin, not an owner.
        let err = store
            .transfer_ownership(&org(), &user("bob"), &user("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TransferRejected { .. }));

        let err = store
            .transfer_ownership(&org(), &user("alice"), &user("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TransferRejected { .. }));
        assert_eq!(store.count_active_owners(&org()).await.unwrap(), 1);
    }

    #[test]
    fn test_ensure_owner_remains() {
        let owner = MembershipRecord::active(user("alice"), org(), Role::Owner);
        let admin = MembershipRecord::active(user("bob"), org(), Role::Admin);

        assert!(matches!(
            ensure_owner_remains(1, &owner, false),
            Err(StoreError::WouldOrphanOrganization(_))
        ));
        assert!(ensure_owner_remains(1, &owner, true).is_ok());
        assert!(ensure_owner_remains(2, &owner, false).is_ok());
        assert!(ensure_owner_remains(0, &admin, false).is_ok());
    }

    #[test]
    fn test_ensure_transferable() {
        let owner = MembershipRecord::active(user("alice"), org(), Role::Owner);
        let member = MembershipRecord::active(user("mia"), org(), Role::Member);
        let invited = MembershipRecord::invitation(user("ivy"), org(), Role::Member, user("alice"));
        let suspended_owner = owner.clone().with_status(MembershipStatus::Suspended);

        assert!(ensure_transferable(&owner, &member).is_ok());
        assert!(ensure_transferable(&owner, &invited).is_err());
        assert!(ensure_transferable(&suspended_owner, &member).is_err());
        assert!(ensure_transferable(&member, &owner).is_err());
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = seeded();
        let err = store.remove_membership(&user("zoe"), &org()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let err = store
            .update_role(&user("alice"), &OrganizationId::new("nope"), Role::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_memberships() {
        let store = seeded();
        let members = store.list_memberships(&org()).await.unwrap();
        assert_eq!(members.len(), 3);
        assert!(store
            .list_memberships(&OrganizationId::new("empty"))
            .await
            .unwrap()
            .is_empty());
    }
}
