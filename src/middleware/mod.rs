mod auth;
mod csrf;
mod error_handler;
mod session;

pub use auth::{require_admin, require_auth};
pub use csrf::{CSRF_FIELD, verify_csrf};
pub use error_handler::log_errors;
pub use session::{REMEMBER_COOKIE, build_cookie, removal_cookie, session_middleware};
