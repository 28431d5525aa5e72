use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePageRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl Page {
    pub async fn create(pool: &PgPool, req: CreatePageRequest) -> Result<Self, AppError> {
        let page = sqlx::query_as::<_, Page>(
            "INSERT INTO pages (title, slug, description, icon, color, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&req.title)
        .bind(&req.slug)
        .bind(&req.description)
        .bind(&req.icon)
        .bind(&req.color)
        .bind(req.sort_order)
        .fetch_one(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("Slug already in use".to_string()),
            other => other,
        })?;
        Ok(page)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, AppError> {
        let page = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(page)
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let pages = sqlx::query_as::<_, Page>("SELECT * FROM pages ORDER BY sort_order, id")
            .fetch_all(pool)
            .await?;
        Ok(pages)
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let pages = sqlx::query_as::<_, Page>(
            "SELECT * FROM pages WHERE is_active = true ORDER BY sort_order, id",
        )
        .fetch_all(pool)
        .await?;
        Ok(pages)
    }

    /// Active pages a specific user holds a grant on, navigation order.
    pub async fn list_granted(pool: &PgPool, user_id: i64) -> Result<Vec<Self>, AppError> {
        let pages = sqlx::query_as::<_, Page>(
            "SELECT p.id, p.title, p.slug, p.description, p.icon, p.color,
                    p.sort_order, p.is_active, p.created_at
             FROM pages p
             JOIN user_permissions up ON up.page_id = p.id
             WHERE up.user_id = $1 AND p.is_active = true
             ORDER BY p.sort_order, p.id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(pages)
    }

    pub async fn update(pool: &PgPool, id: i64, req: UpdatePageRequest) -> Result<Self, AppError> {
        let page = sqlx::query_as::<_, Page>(
            "UPDATE pages SET
                 title = COALESCE($2, title),
                 slug = COALESCE($3, slug),
                 description = COALESCE($4, description),
                 icon = COALESCE($5, icon),
                 color = COALESCE($6, color),
                 sort_order = COALESCE($7, sort_order),
                 is_active = COALESCE($8, is_active)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(req.title)
        .bind(req.slug)
        .bind(req.description)
        .bind(req.icon)
        .bind(req.color)
        .bind(req.sort_order)
        .bind(req.is_active)
        .fetch_optional(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("Slug already in use".to_string()),
            other => other,
        })?
        .ok_or(AppError::NotFound)?;
        Ok(page)
    }

    /// Removes the page with its grants and links in one transaction.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM user_permissions WHERE page_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM links WHERE page_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
