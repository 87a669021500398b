//! PostgreSQL membership store.
//!
//! Rows live in `memberships`, keyed on `(user_id, organization_id)`. Role and
//! status are stored as their catalog tokens; a token that fails to parse on
//! read is reported as [`StoreError::CorruptRecord`].
//!
//! Every mutation that can change who owns an organization takes its locks in
//! one order: the organization's active owner rows first (sorted by user id),
//! then the rows it writes, also sorted by user id. Two concurrent demotions
//! therefore serialize on the owner set instead of deadlocking, and neither
//! can observe "another owner exists" after the other has committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::rbac::context::{ensure_owner_remains, ensure_transferable};
use crate::rbac::{
    MembershipRecord, MembershipStatus, MembershipStore, OrganizationId, Role, StoreError, UserId,
};

const SELECT_COLUMNS: &str =
    "user_id, organization_id, role, status, invited_by, created_at, updated_at";

/// sqlx-backed [`MembershipStore`].
#[derive(Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock the organization's active owners. Always the first lock a
    /// mutation takes.
    async fn lock_active_owners(
        tx: &mut Transaction<'_, Postgres>,
        organization_id: &OrganizationId,
    ) -> Result<Vec<String>, StoreError> {
        let owners: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM memberships
            WHERE organization_id = $1 AND role = 'owner' AND status = 'active'
            ORDER BY user_id
            FOR UPDATE
            "#,
        )
        .bind(organization_id.as_str())
        .fetch_all(&mut **tx)
        .await?;
        Ok(owners)
    }

    /// Lock one membership row.
    async fn lock_membership(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<MembershipRecord, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memberships WHERE user_id = $1 AND organization_id = $2 FOR UPDATE",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(organization_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => row_to_record(&row),
            None => Err(StoreError::not_found(user_id, organization_id)),
        }
    }
}

/// Row locks beyond the owner set are taken in ascending user id order.
fn lock_order<'a>(a: &'a UserId, b: &'a UserId) -> (&'a UserId, &'a UserId) {
    if a.as_str() <= b.as_str() {
        (a, b)
    } else {
        (b, a)
    }
}

fn row_to_record(row: &PgRow) -> Result<MembershipRecord, StoreError> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;
    let invited_by: Option<String> = row.try_get("invited_by")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(MembershipRecord {
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        organization_id: OrganizationId::new(row.try_get::<String, _>("organization_id")?),
        role: Role::parse(&role).ok_or_else(|| StoreError::CorruptRecord {
            field: "role",
            value: role.clone(),
        })?,
        status: status.parse::<MembershipStatus>().map_err(|_| StoreError::CorruptRecord {
            field: "status",
            value: status.clone(),
        })?,
        invited_by: invited_by.map(UserId::new),
        created_at,
        updated_at,
    })
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn get_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<Option<MembershipRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memberships WHERE user_id = $1 AND organization_id = $2",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(organization_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list_memberships(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM memberships WHERE organization_id = $1 ORDER BY created_at, user_id",
            SELECT_COLUMNS
        ))
        .bind(organization_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn insert_membership(&self, record: MembershipRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO memberships
                (user_id, organization_id, role, status, invited_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, organization_id) DO NOTHING
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(record.organization_id.as_str())
        .bind(record.role.as_str())
        .bind(record.status.as_str())
        .bind(record.invited_by.as_ref().map(|u| u.as_str()))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                user: record.user_id.to_string(),
                org: record.organization_id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_role(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        role: Role,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let owners = Self::lock_active_owners(&mut tx, organization_id).await?;
        let current = Self::lock_membership(&mut tx, user_id, organization_id).await?;
        let stays_owner = role == Role::Owner && current.status == MembershipStatus::Active;
        ensure_owner_remains(owners.len(), &current, stays_owner)?;

        sqlx::query(
            "UPDATE memberships SET role = $3, updated_at = NOW() \
             WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id.as_str())
        .bind(organization_id.as_str())
        .bind(role.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_status(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
        status: MembershipStatus,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let owners = Self::lock_active_owners(&mut tx, organization_id).await?;
        let current = Self::lock_membership(&mut tx, user_id, organization_id).await?;
        let stays_owner = current.role == Role::Owner && status == MembershipStatus::Active;
        ensure_owner_remains(owners.len(), &current, stays_owner)?;

        sqlx::query(
            "UPDATE memberships SET status = $3, updated_at = NOW() \
             WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id.as_str())
        .bind(organization_id.as_str())
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_membership(
        &self,
        user_id: &UserId,
        organization_id: &OrganizationId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let owners = Self::lock_active_owners(&mut tx, organization_id).await?;
        let current = Self::lock_membership(&mut tx, user_id, organization_id).await?;
        ensure_owner_remains(owners.len(), &current, false)?;

        sqlx::query("DELETE FROM memberships WHERE user_id = $1 AND organization_id = $2")
            .bind(user_id.as_str())
            .bind(organization_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_active_owners(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM memberships \
             WHERE organization_id = $1 AND role = 'owner' AND status = 'active'",
        )
        .bind(organization_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn transfer_ownership(
        &self,
        organization_id: &OrganizationId,
        from: &UserId,
        to: &UserId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_active_owners(&mut tx, organization_id).await?;

        let (first, second) = lock_order(from, to);
        let first = Self::lock_membership(&mut tx, first, organization_id).await?;
        let second = Self::lock_membership(&mut tx, second, organization_id).await?;
        let (current, target) = if &first.user_id == from {
            (first, second)
        } else {
            (second, first)
        };
        ensure_transferable(&current, &target)?;

        // Promote before demoting so the organization is never ownerless.
        for (user, role) in [(to, Role::Owner), (from, Role::Admin)] {
            sqlx::query(
                "UPDATE memberships SET role = $3, updated_at = NOW() \
                 WHERE user_id = $1 AND organization_id = $2",
            )
            .bind(user.as_str())
            .bind(organization_id.as_str())
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_is_symmetric() {
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        assert_eq!(lock_order(&alice, &bob), (&alice, &bob));
        assert_eq!(lock_order(&bob, &alice), (&alice, &bob));
        assert_eq!(lock_order(&alice, &alice), (&alice, &alice));
    }
}
