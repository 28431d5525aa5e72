use axum::{
    body::Body,
    extract::State,
    http::{Request, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::AppState;
use crate::auth::manager::{CurrentIdentity, Identity};
use crate::auth::session::SessionContext;
use crate::error::AppError;

/// Cookie carrying the plaintext remember secret; the server only ever
/// stores its SHA-256.
pub const REMEMBER_COOKIE: &str = "remember_token";

pub fn build_cookie(name: &str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_string(), value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_max_age(time::Duration::seconds(max_age_secs));
    cookie
}

pub fn removal_cookie(name: &str, secure: bool) -> Cookie<'static> {
    build_cookie(name, String::new(), 0, secure)
}

fn append_cookie(response: &mut Response, cookie: Cookie<'static>) {
    if let Ok(value) = cookie.to_string().parse() {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

/// Loads (or creates) the server-side session for the request, resolves the
/// authenticated identity (session first, remember cookie fallback), and
/// writes the session back exactly once after the handler runs. Identity
/// resolution always happens here, before any authorization or CSRF check
/// deeper in the stack.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let session = match load_session(&state, &jar).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    if session.needs_rotation(state.config.session_rotation()) {
        session.rotate();
    }

    let remember = jar.get(REMEMBER_COOKIE).map(|c| c.value().to_string());
    let resolved = match state.auth().resolve(&session, remember.as_deref()).await {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };
    let clear_remember = resolved.clear_remember;

    let identity = resolved.user.as_ref().map(Identity::from);
    if let Some(identity) = &identity {
        req.extensions_mut().insert(identity.clone());
    }
    req.extensions_mut().insert(CurrentIdentity(identity));
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    persist(&state, &session, &mut response).await;
    if clear_remember {
        append_cookie(
            &mut response,
            removal_cookie(REMEMBER_COOKIE, state.config.cookie_secure),
        );
    }
    response
}

async fn load_session(state: &AppState, jar: &CookieJar) -> Result<SessionContext, AppError> {
    if let Some(cookie) = jar.get(&state.config.session_cookie_name) {
        if let Some(data) = state.sessions.load(cookie.value()).await? {
            return Ok(SessionContext::from_loaded(cookie.value().to_string(), data));
        }
    }
    Ok(SessionContext::fresh())
}

async fn persist(state: &AppState, session: &SessionContext, response: &mut Response) {
    let snapshot = session.persist_state();
    let config = &state.config;

    if snapshot.destroyed {
        if let Some(old_id) = &snapshot.original_id {
            if let Err(e) = state.sessions.delete(old_id).await {
                tracing::error!("Failed to drop destroyed session: {:?}", e);
            }
        }
        append_cookie(
            response,
            removal_cookie(&config.session_cookie_name, config.cookie_secure),
        );
        return;
    }

    let id_changed = snapshot.original_id.as_deref() != Some(snapshot.id.as_str());
    if snapshot.dirty || id_changed {
        if let Err(e) = state
            .sessions
            .save(&snapshot.id, &snapshot.data, config.session_lifetime())
            .await
        {
            tracing::error!("Failed to persist session {}: {:?}", snapshot.id, e);
            return;
        }
        if id_changed {
            if let Some(old_id) = &snapshot.original_id {
                if let Err(e) = state.sessions.delete(old_id).await {
                    tracing::error!("Failed to drop rotated session: {:?}", e);
                }
            }
            append_cookie(
                response,
                build_cookie(
                    &config.session_cookie_name,
                    snapshot.id,
                    config.session_lifetime_secs as i64,
                    config.cookie_secure,
                ),
            );
        }
    }
}
