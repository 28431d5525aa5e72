use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::manager::Identity,
    error::AppError,
    models::{
        Link, Page, Permission,
        page::{CreatePageRequest, UpdatePageRequest},
    },
    result::ApiResult,
};

/// Navigation list: every page the caller may read, nothing else.
pub async fn accessible_pages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResult<Vec<Page>>>, AppError> {
    let pages = state.gate().accessible_pages(&identity).await?;
    Ok(Json(ApiResult::success(pages)))
}

pub async fn page_links(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(page_id): Path<i64>,
) -> Result<Json<ApiResult<Vec<Link>>>, AppError> {
    let page = Page::find_by_id(&state.pool, page_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !page.is_active && !identity.is_admin() {
        return Err(AppError::NotFound);
    }

    let decision = state
        .gate()
        .authorize(Some(&identity), page.id, Permission::Read)
        .await?;
    if !decision.is_allowed() {
        return Err(AppError::Forbidden);
    }

    let links = Link::list_for_page(&state.pool, page.id).await?;
    Ok(Json(ApiResult::success(links)))
}

// Admin surface.

pub async fn list_pages(
    State(state): State<AppState>,
) -> Result<Json<ApiResult<Vec<Page>>>, AppError> {
    let pages = Page::list_all(&state.pool).await?;
    Ok(Json(ApiResult::success(pages)))
}

pub async fn create_page(
    State(state): State<AppState>,
    Json(req): Json<CreatePageRequest>,
) -> Result<(StatusCode, Json<ApiResult<Page>>), AppError> {
    if req.title.trim().is_empty() || req.slug.trim().is_empty() {
        return Err(AppError::BadRequest("Title and slug are required".to_string()));
    }
    let page = Page::create(&state.pool, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResult::success(page))))
}

pub async fn update_page(
    State(state): State<AppState>,
    Path(page_id): Path<i64>,
    Json(req): Json<UpdatePageRequest>,
) -> Result<Json<ApiResult<Page>>, AppError> {
    let page = Page::update(&state.pool, page_id, req).await?;
    Ok(Json(ApiResult::success(page)))
}

pub async fn delete_page(
    State(state): State<AppState>,
    Path(page_id): Path<i64>,
) -> Result<Json<ApiResult<()>>, AppError> {
    Page::delete(&state.pool, page_id).await?;
    Ok(Json(ApiResult::success(())))
}
