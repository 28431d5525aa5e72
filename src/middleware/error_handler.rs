use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::error;

const LOG_BODY_LIMIT: usize = 1024;

/// Logs the body of server-error responses before they leave the process;
/// clients only ever see the generic message.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, LOG_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        %method,
        path,
        status = %parts.status,
        body = %String::from_utf8_lossy(&bytes),
        "Server error response"
    );

    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
