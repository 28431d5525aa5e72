use crate::auth::session::SessionContext;
use crate::auth::token;

/// Per-session anti-forgery token. The token rides along as a hidden form
/// field, a query parameter, or the `X-CSRF-Token` header; verification is
/// constant-time against the session copy.
pub fn issue(session: &SessionContext) -> String {
    session.csrf_token()
}

pub fn verify(session: &SessionContext, supplied: Option<&str>) -> bool {
    let Some(stored) = session.csrf_current() else {
        return false;
    };
    match supplied {
        Some(supplied) if !supplied.is_empty() => token::constant_time_eq(&stored, supplied),
        _ => false,
    }
}

/// Replaces the session token; done at login alongside the session rotation.
pub fn rotate(session: &SessionContext) -> String {
    session.rotate_csrf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_in_same_session() {
        let session = SessionContext::fresh();
        let token = issue(&session);
        assert!(verify(&session, Some(&token)));
    }

    #[test]
    fn foreign_and_empty_tokens_fail() {
        let session = SessionContext::fresh();
        let _ = issue(&session);
        assert!(!verify(&session, Some("anything-else")));
        assert!(!verify(&session, Some("")));
        assert!(!verify(&session, None));
    }

    #[test]
    fn verification_fails_without_an_issued_token() {
        let session = SessionContext::fresh();
        assert!(!verify(&session, Some("speculative")));
    }

    #[test]
    fn verification_fails_after_session_destruction() {
        let session = SessionContext::fresh();
        let token = issue(&session);
        session.destroy();
        assert!(!verify(&session, Some(&token)));
    }

    #[test]
    fn rotation_invalidates_the_old_token() {
        let session = SessionContext::fresh();
        let old = issue(&session);
        let new = rotate(&session);
        assert!(!verify(&session, Some(&old)));
        assert!(verify(&session, Some(&new)));
    }
}
