use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::auth::manager::Identity;
use crate::error::AppError;

/// Rejects requests that carry no resolved identity. 401, not 403: the
/// client should be told to log in rather than that access was refused.
pub async fn require_auth(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    if req.extensions().get::<Identity>().is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// Admin-only routes: 401 without identity, 403 for non-admins.
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<Identity>() {
        None => Err(AppError::Unauthorized),
        Some(identity) if !identity.is_admin() => Err(AppError::Forbidden),
        Some(_) => Ok(next.run(req).await),
    }
}
