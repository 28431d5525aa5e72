use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::{
    AppState,
    auth::{LoginOutcome, csrf, manager::Identity, session::SessionContext},
    error::AppError,
    middleware::{REMEMBER_COOKIE, build_cookie, removal_cookie},
    models::user::{LoginRequest, LoginResponse},
    result::ApiResult,
};

pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let outcome = state
        .auth()
        .login(&session, &req.email, &req.password, req.remember)
        .await?;

    match outcome {
        LoginOutcome::Success {
            user,
            remember_secret,
        } => {
            let jar = match remember_secret {
                Some(secret) => jar.add(build_cookie(
                    REMEMBER_COOKIE,
                    secret,
                    state.config.remember_lifetime_secs as i64,
                    state.config.cookie_secure,
                )),
                None => jar,
            };
            let body = Json(ApiResult::success(LoginResponse {
                user_id: user.id,
                email: user.email,
                role: user.role,
            }));
            Ok((jar, body).into_response())
        }
        // One undifferentiated message for wrong password, unknown email,
        // and deactivated accounts.
        LoginOutcome::Rejected => Ok((
            StatusCode::UNAUTHORIZED,
            Json(ApiResult::<LoginResponse>::error(
                StatusCode::UNAUTHORIZED.as_u16() as i32,
                "Invalid email or password",
            )),
        )
            .into_response()),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResult<()>>), AppError> {
    state.auth().logout(&session).await?;
    let jar = jar.add(removal_cookie(REMEMBER_COOKIE, state.config.cookie_secure));
    Ok((jar, Json(ApiResult::success(()))))
}

pub async fn me(Extension(identity): Extension<Identity>) -> Json<ApiResult<LoginResponse>> {
    Json(ApiResult::success(LoginResponse {
        user_id: identity.user_id,
        email: identity.email,
        role: identity.role,
    }))
}

#[derive(Serialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Hands script clients the session's anti-forgery token, the API-side
/// equivalent of the hidden form field.
pub async fn csrf_token(
    Extension(session): Extension<SessionContext>,
) -> Json<ApiResult<CsrfTokenResponse>> {
    Json(ApiResult::success(CsrfTokenResponse {
        csrf_token: csrf::issue(&session),
    }))
}
