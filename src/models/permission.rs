use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::models::user::Role;

/// Ordered permission lattice: `Read < Edit`, so "edit implies read" is the
/// comparison `grant >= required` and nothing else.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "permission_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Edit,
}

impl Permission {
    pub fn satisfies(self, required: Permission) -> bool {
        self >= required
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionGrant {
    pub id: i64,
    pub user_id: i64,
    pub page_id: i64,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
}

/// Grant joined with the grantee's details, for the admin page view.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PageGrant {
    pub user_id: i64,
    pub permission: Permission,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SetGrantRequest {
    pub user_id: i64,
    pub page_id: i64,
    pub permission: Permission,
}

#[derive(Debug, Deserialize)]
pub struct RemoveGrantRequest {
    pub user_id: i64,
    pub page_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceGrantsRequest {
    /// Full replacement set: (page_id, permission) per entry.
    pub grants: Vec<GrantEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GrantEntry {
    pub page_id: i64,
    pub permission: Permission,
}

impl PermissionGrant {
    pub async fn find_for(
        pool: &PgPool,
        user_id: i64,
        page_id: i64,
    ) -> Result<Option<Permission>, AppError> {
        let permission = sqlx::query_scalar::<_, Permission>(
            "SELECT permission FROM user_permissions WHERE user_id = $1 AND page_id = $2",
        )
        .bind(user_id)
        .bind(page_id)
        .fetch_optional(pool)
        .await?;
        Ok(permission)
    }

    /// One grant per (user, page) pair; a second set for the same pair
    /// replaces the previous permission in a single statement.
    pub async fn set(
        pool: &PgPool,
        user_id: i64,
        page_id: i64,
        permission: Permission,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_permissions (user_id, page_id, permission)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, page_id) DO UPDATE SET permission = EXCLUDED.permission",
        )
        .bind(user_id)
        .bind(page_id)
        .bind(permission)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn remove(pool: &PgPool, user_id: i64, page_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND page_id = $2")
            .bind(user_id)
            .bind(page_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Replaces a user's whole grant set inside one transaction, so no
    /// request observes the user with an empty set mid-replacement.
    pub async fn replace_for_user(
        pool: &PgPool,
        user_id: i64,
        grants: &[GrantEntry],
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for grant in grants {
            sqlx::query(
                "INSERT INTO user_permissions (user_id, page_id, permission) VALUES ($1, $2, $3)",
            )
            .bind(user_id)
            .bind(grant.page_id)
            .bind(grant.permission)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_page(pool: &PgPool, page_id: i64) -> Result<Vec<PageGrant>, AppError> {
        let grants = sqlx::query_as::<_, PageGrant>(
            "SELECT up.user_id, up.permission, u.email, u.first_name, u.last_name, u.role
             FROM user_permissions up
             JOIN users u ON u.id = up.user_id
             WHERE up.page_id = $1 AND u.is_active = true
             ORDER BY u.first_name, u.last_name",
        )
        .bind(page_id)
        .fetch_all(pool)
        .await?;
        Ok(grants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_implies_read_but_not_the_reverse() {
        assert!(Permission::Edit.satisfies(Permission::Read));
        assert!(Permission::Edit.satisfies(Permission::Edit));
        assert!(Permission::Read.satisfies(Permission::Read));
        assert!(!Permission::Read.satisfies(Permission::Edit));
    }
}
