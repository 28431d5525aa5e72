use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::AppError,
    models::{
        User,
        user::{CreateUserRequest, UpdateUserRequest},
    },
    result::ApiResult,
};

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResult<Vec<User>>>, AppError> {
    let users = User::list(&state.pool).await?;
    Ok(Json(ApiResult::success(users)))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResult<User>>), AppError> {
    if !req.email.contains('@') {
        return Err(AppError::BadRequest("A valid email address is required".to_string()));
    }
    if req.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters long".to_string(),
        ));
    }
    let user = User::create(&state.pool, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResult::success(user))))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResult<User>>, AppError> {
    if let Some(password) = &req.password {
        if password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters long".to_string(),
            ));
        }
    }
    let user = User::update(&state.pool, user_id, req).await?;
    Ok(Json(ApiResult::success(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResult<()>>, AppError> {
    User::delete(&state.pool, user_id).await?;
    Ok(Json(ApiResult::success(())))
}
