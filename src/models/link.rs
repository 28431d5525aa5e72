use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Remote,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub page_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub page_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i32>,
}

impl Link {
    pub fn kind(&self) -> LinkKind {
        if self.file_path.is_some() {
            LinkKind::File
        } else {
            LinkKind::Remote
        }
    }

    pub async fn create(pool: &PgPool, req: CreateLinkRequest) -> Result<Self, AppError> {
        // Exactly one of the two kinds may be populated.
        match (&req.url, &req.file_path) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "A link is either a remote URL or a stored file, not both".to_string(),
                ));
            }
            (None, None) => {
                return Err(AppError::BadRequest(
                    "A link needs a remote URL or a stored file".to_string(),
                ));
            }
            (None, Some(_)) if req.file_name.is_none() => {
                return Err(AppError::BadRequest(
                    "A file link needs its original file name".to_string(),
                ));
            }
            _ => {}
        }

        let link = sqlx::query_as::<_, Link>(
            "INSERT INTO links
                 (page_id, title, url, file_path, file_name, file_size, file_type,
                  is_featured, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(req.page_id)
        .bind(&req.title)
        .bind(&req.url)
        .bind(&req.file_path)
        .bind(&req.file_name)
        .bind(req.file_size)
        .bind(&req.file_type)
        .bind(req.is_featured)
        .bind(req.sort_order)
        .fetch_one(pool)
        .await?;
        Ok(link)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, AppError> {
        let link = sqlx::query_as::<_, Link>("SELECT * FROM links WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(link)
    }

    pub async fn list_for_page(pool: &PgPool, page_id: i64) -> Result<Vec<Self>, AppError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT * FROM links
             WHERE page_id = $1 AND is_active = true
             ORDER BY is_featured DESC, sort_order, id",
        )
        .bind(page_id)
        .fetch_all(pool)
        .await?;
        Ok(links)
    }

    /// Single-statement increment so concurrent clicks never lose updates.
    /// Inactive links are never counted.
    pub async fn increment_clicks(pool: &PgPool, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE links SET click_count = click_count + 1
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update(pool: &PgPool, id: i64, req: UpdateLinkRequest) -> Result<Self, AppError> {
        let link = sqlx::query_as::<_, Link>(
            "UPDATE links SET
                 title = COALESCE($2, title),
                 url = COALESCE($3, url),
                 is_active = COALESCE($4, is_active),
                 is_featured = COALESCE($5, is_featured),
                 sort_order = COALESCE($6, sort_order)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(req.title)
        .bind(req.url)
        .bind(req.is_active)
        .bind(req.is_featured)
        .bind(req.sort_order)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(link)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<Self, AppError> {
        let link = sqlx::query_as::<_, Link>("DELETE FROM links WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: Option<&str>, file_path: Option<&str>) -> Link {
        Link {
            id: 1,
            page_id: 1,
            title: "t".to_string(),
            url: url.map(String::from),
            file_path: file_path.map(String::from),
            file_name: file_path.map(|_| "name.pdf".to_string()),
            file_size: file_path.map(|_| 10),
            file_type: None,
            is_active: true,
            is_featured: false,
            sort_order: 0,
            click_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn kind_follows_populated_side() {
        assert_eq!(sample(Some("https://example.com"), None).kind(), LinkKind::Remote);
        assert_eq!(sample(None, Some("uploads/x.pdf")).kind(), LinkKind::File);
    }
}
