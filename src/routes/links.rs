use axum::{
    extract::{Extension, Json, Multipart, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::manager::Identity,
    error::AppError,
    files::upload::{self, StoredFile},
    models::{
        Link, Page, Permission,
        link::{CreateLinkRequest, UpdateLinkRequest},
    },
    result::ApiResult,
};

/// Records a click on a link the caller can read. The increment is one
/// atomic statement; simultaneous clicks never lose counts.
pub async fn record_click(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(link_id): Path<i64>,
) -> Result<Json<ApiResult<()>>, AppError> {
    let link = Link::find_by_id(&state.pool, link_id)
        .await?
        .filter(|l| l.is_active)
        .ok_or(AppError::NotFound)?;

    let decision = state
        .gate()
        .authorize(Some(&identity), link.page_id, Permission::Read)
        .await?;
    if !decision.is_allowed() {
        return Err(AppError::Forbidden);
    }

    if !Link::increment_clicks(&state.pool, link.id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(ApiResult::success(())))
}

// Admin surface.

pub async fn create_link(
    State(state): State<AppState>,
    Json(req): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ApiResult<Link>>), AppError> {
    if Page::find_by_id(&state.pool, req.page_id).await?.is_none() {
        return Err(AppError::BadRequest("Owning page does not exist".to_string()));
    }
    let link = Link::create(&state.pool, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResult::success(link))))
}

pub async fn update_link(
    State(state): State<AppState>,
    Path(link_id): Path<i64>,
    Json(req): Json<UpdateLinkRequest>,
) -> Result<Json<ApiResult<Link>>, AppError> {
    let link = Link::update(&state.pool, link_id, req).await?;
    Ok(Json(ApiResult::success(link)))
}

pub async fn delete_link(
    State(state): State<AppState>,
    Path(link_id): Path<i64>,
) -> Result<Json<ApiResult<()>>, AppError> {
    let link = Link::delete(&state.pool, link_id).await?;
    // The row is gone; a leftover file only wastes disk, so log and move on.
    if let Some(path) = &link.file_path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("Could not remove stored file {}: {}", path, e);
        }
    }
    Ok(Json(ApiResult::success(())))
}

/// Multipart upload of a document destined for a file link. The CSRF token
/// arrives via query or header; multipart bodies are never buffered.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResult<StoredFile>>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("Malformed multipart body".to_string()))?
    {
        if field.name() == Some("file") {
            let stored = upload::store(&state.config, field).await?;
            return Ok((StatusCode::CREATED, Json(ApiResult::success(stored))));
        }
    }
    Err(AppError::BadRequest("No file field in upload".to_string()))
}
