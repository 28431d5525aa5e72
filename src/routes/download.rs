use axum::{
    body::Body,
    extract::{Extension, Path, State},
    http::{
        HeaderMap, StatusCode,
        header::{
            ACCEPT_RANGES, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE,
            CONTENT_TYPE, RANGE,
        },
    },
    response::Response,
};

use crate::{
    AppState,
    auth::manager::CurrentIdentity,
    error::AppError,
    files::{range, stream},
    models::{Link, LinkKind, Permission},
};

/// `GET /download/{link_id}` — Resolve, Authorize, ValidateExistence,
/// Stream. The click counter moves exactly once per served request, after
/// the file is open and before the first byte goes out.
pub async fn download(
    State(state): State<AppState>,
    Extension(CurrentIdentity(identity)): Extension<CurrentIdentity>,
    Path(link_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    // Resolve.
    let link = Link::find_by_id(&state.pool, link_id)
        .await?
        .filter(|l| l.is_active)
        .ok_or(AppError::NotFound)?;
    if link.kind() != LinkKind::File {
        return Err(AppError::BadRequest("Link is not a downloadable file".to_string()));
    }

    // Authorize: read permission on the owning page.
    let decision = state
        .gate()
        .authorize(identity.as_ref(), link.page_id, Permission::Read)
        .await?;
    if !decision.is_allowed() {
        return Err(match identity {
            Some(_) => AppError::Forbidden,
            None => AppError::Unauthorized,
        });
    }

    let Some(path) = link.file_path.clone() else {
        return Err(AppError::InternalServerError);
    };

    // ValidateExistence: the row can outlive the physical file.
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(link_id = link.id, path, "Stored file missing on disk");
            return Err(AppError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };
    let file_size = metadata.len();

    // Unparseable or unsatisfiable ranges fall back to a full response.
    let window = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| range::parse(raw, file_size));
    let (status, start, body_len) = match &window {
        Some(w) => (StatusCode::PARTIAL_CONTENT, w.start, w.len()),
        None => (StatusCode::OK, 0, file_size),
    };

    // A failed open must not move the counter.
    let file = match stream::open_at(&path, start).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(link_id = link.id, path, "Stored file vanished before open");
            return Err(AppError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };
    Link::increment_clicks(&state.pool, link.id).await?;

    let file_name = link
        .file_name
        .as_deref()
        .unwrap_or("download")
        .replace(['"', '\r', '\n'], "");
    let content_type = link
        .file_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, body_len)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )
        .header(CACHE_CONTROL, "private, must-revalidate")
        .header(ACCEPT_RANGES, "bytes");
    if let Some(w) = &window {
        builder = builder.header(CONTENT_RANGE, w.content_range(file_size));
    }

    builder
        .body(Body::from_stream(stream::chunks(file, body_len)))
        .map_err(|e| {
            tracing::error!("Failed to build download response: {}", e);
            AppError::InternalServerError
        })
}
