use axum::extract::{Json, Path, State};

use crate::{
    AppState,
    error::AppError,
    models::{
        Page, PermissionGrant, User,
        permission::{PageGrant, RemoveGrantRequest, ReplaceGrantsRequest, SetGrantRequest},
    },
    result::ApiResult,
};

pub async fn page_grants(
    State(state): State<AppState>,
    Path(page_id): Path<i64>,
) -> Result<Json<ApiResult<Vec<PageGrant>>>, AppError> {
    if Page::find_by_id(&state.pool, page_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let grants = PermissionGrant::list_for_page(&state.pool, page_id).await?;
    Ok(Json(ApiResult::success(grants)))
}

/// Sets one (user, page) grant; an existing grant for the pair is replaced,
/// never duplicated.
pub async fn set_grant(
    State(state): State<AppState>,
    Json(req): Json<SetGrantRequest>,
) -> Result<Json<ApiResult<()>>, AppError> {
    PermissionGrant::set(&state.pool, req.user_id, req.page_id, req.permission).await?;
    Ok(Json(ApiResult::success(())))
}

pub async fn remove_grant(
    State(state): State<AppState>,
    Json(req): Json<RemoveGrantRequest>,
) -> Result<Json<ApiResult<()>>, AppError> {
    PermissionGrant::remove(&state.pool, req.user_id, req.page_id).await?;
    Ok(Json(ApiResult::success(())))
}

/// Replaces a user's whole grant set in one transaction.
pub async fn replace_user_grants(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<ReplaceGrantsRequest>,
) -> Result<Json<ApiResult<()>>, AppError> {
    if User::find_by_id(&state.pool, user_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    PermissionGrant::replace_for_user(&state.pool, user_id, &req.grants).await?;
    Ok(Json(ApiResult::success(())))
}
