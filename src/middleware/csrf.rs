use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};

use crate::auth::csrf;
use crate::auth::session::SessionContext;
use crate::error::AppError;

/// Field/parameter name the token travels under; also accepted as the
/// `X-CSRF-Token` header.
pub const CSRF_FIELD: &str = "csrf_token";

const FORM_BUFFER_LIMIT: usize = 64 * 1024;

/// Verifies the anti-forgery token on every state-changing request before
/// the handler sees it. Lookup precedence: form field, query parameter,
/// request header. Multipart bodies are not buffered; uploads pass the
/// token via query or header.
pub async fn verify_csrf(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(req).await);
    }

    let session = req
        .extensions()
        .get::<SessionContext>()
        .cloned()
        .ok_or(AppError::InternalServerError)?;

    let (parts, body) = req.into_parts();

    let is_form = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let (supplied_from_form, body) = if is_form {
        let bytes = to_bytes(body, FORM_BUFFER_LIMIT)
            .await
            .map_err(|_| AppError::BadRequest("Request body too large".to_string()))?;
        let token = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|form| find_pair(form, CSRF_FIELD));
        (token, Body::from(bytes))
    } else {
        (None, body)
    };

    let supplied = supplied_from_form
        .or_else(|| parts.uri.query().and_then(|q| find_pair(q, CSRF_FIELD)))
        .or_else(|| {
            parts
                .headers
                .get("x-csrf-token")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        });

    if !csrf::verify(&session, supplied.as_deref()) {
        tracing::warn!(
            method = %parts.method,
            path = %parts.uri.path(),
            "CSRF verification failed"
        );
        return Err(AppError::CsrfMismatch);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

fn find_pair(encoded: &str, name: &str) -> Option<String> {
    for pair in encoded.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if urlencoding::decode(key).map(|k| k == name).unwrap_or(false) {
            return urlencoding::decode(value).ok().map(|v| v.into_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_pair_picks_the_named_parameter() {
        assert_eq!(
            find_pair("a=1&csrf_token=tok-abc&b=2", CSRF_FIELD).as_deref(),
            Some("tok-abc")
        );
        assert_eq!(find_pair("a=1&b=2", CSRF_FIELD), None);
        assert_eq!(find_pair("", CSRF_FIELD), None);
    }

    #[test]
    fn find_pair_decodes_percent_escapes() {
        assert_eq!(
            find_pair("csrf_token=tok%2Dwith%2Ddashes", CSRF_FIELD).as_deref(),
            Some("tok-with-dashes")
        );
    }
}
