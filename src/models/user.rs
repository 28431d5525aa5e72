use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::auth::password::hash_password;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub remember_token: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

const COLUMNS: &str = "id, email, first_name, last_name, role, is_active, \
                       password_hash, remember_token, last_login, created_at";

impl User {
    pub async fn create(pool: &PgPool, req: CreateUserRequest) -> Result<Self, AppError> {
        let password_hash = hash_password(&req.password).map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            AppError::InternalServerError
        })?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, first_name, last_name, role, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(req.email.to_lowercase())
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.role)
        .bind(&password_hash)
        .fetch_one(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("Email already in use".to_string()),
            other => other,
        })?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_remember_hash(pool: &PgPool, hash: &str) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE remember_token = $1 AND is_active = true"
        ))
        .bind(hash)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY first_name, last_name"
        ))
        .fetch_all(pool)
        .await?;
        Ok(users)
    }

    pub async fn update(pool: &PgPool, id: i64, req: UpdateUserRequest) -> Result<Self, AppError> {
        let password_hash = match &req.password {
            Some(password) => Some(hash_password(password).map_err(|e| {
                tracing::error!("Failed to hash password: {}", e);
                AppError::InternalServerError
            })?),
            None => None,
        };

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                 first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name),
                 password_hash = COALESCE($4, password_hash),
                 is_active = COALESCE($5, is_active)
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(password_hash)
        .bind(req.is_active)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(user)
    }

    pub async fn record_login(pool: &PgPool, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_remember_hash(
        pool: &PgPool,
        id: i64,
        hash: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET remember_token = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Removes the user together with its permission grants in one
    /// transaction; a user row never outlives a dangling grant.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
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
