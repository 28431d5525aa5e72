use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::password::verify_password;
use crate::auth::session::SessionContext;
use crate::auth::token;
use crate::error::AppError;
use crate::models::user::{Role, User};

/// Minimal authenticated identity carried through the request as an
/// extension; the full user row stays behind the credential store.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Request extension that is present on every request, authenticated or
/// not, for endpoints that serve both kinds of caller.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<Identity>);

/// Credential lookups the auth manager needs. Postgres in production,
/// in-memory in tests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_for_auth(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn find_by_remember_hash(&self, hash: &str) -> Result<Option<User>, AppError>;
    async fn record_login(&self, id: i64) -> Result<(), AppError>;
    async fn set_remember_hash(&self, id: i64, hash: Option<&str>) -> Result<(), AppError>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_for_auth(&self, email: &str) -> Result<Option<User>, AppError> {
        User::find_by_email(&self.pool, email).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        User::find_by_id(&self.pool, id).await
    }

    async fn find_by_remember_hash(&self, hash: &str) -> Result<Option<User>, AppError> {
        User::find_by_remember_hash(&self.pool, hash).await
    }

    async fn record_login(&self, id: i64) -> Result<(), AppError> {
        User::record_login(&self.pool, id).await
    }

    async fn set_remember_hash(&self, id: i64, hash: Option<&str>) -> Result<(), AppError> {
        User::set_remember_hash(&self.pool, id, hash).await
    }
}

pub enum LoginOutcome {
    /// Credentials accepted; when "remember" was requested, the plaintext
    /// secret destined for the cookie. Only its SHA-256 was stored.
    Success {
        user: User,
        remember_secret: Option<String>,
    },
    /// Wrong password, unknown email, or inactive account; deliberately
    /// undifferentiated, and no session state was written.
    Rejected,
}

/// Outcome of per-request identity resolution.
pub struct Resolved {
    pub user: Option<User>,
    /// The remember cookie matched no active user and should be expired.
    pub clear_remember: bool,
}

pub struct AuthManager {
    users: Arc<dyn CredentialStore>,
}

impl AuthManager {
    pub fn new(users: Arc<dyn CredentialStore>) -> Self {
        Self { users }
    }

    pub async fn login(
        &self,
        session: &SessionContext,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<LoginOutcome, AppError> {
        let user = self
            .users
            .find_for_auth(email)
            .await
            .map_err(|_| AppError::AuthenticationUnavailable)?;

        let user = match user {
            Some(user) if user.is_active => user,
            // Unknown email and inactive account fall through together.
            _ => return Ok(LoginOutcome::Rejected),
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => return Ok(LoginOutcome::Rejected),
            Err(e) => {
                // Unverifiable stored hash; reject rather than distinguish.
                tracing::error!("Password verification failed for user {}: {}", user.id, e);
                return Ok(LoginOutcome::Rejected);
            }
        }

        self.users
            .record_login(user.id)
            .await
            .map_err(|_| AppError::AuthenticationUnavailable)?;

        session.set_user(user.id, &user.email, user.role);
        // New id and CSRF token across the privilege boundary.
        session.rotate();
        session.rotate_csrf();

        let remember_secret = if remember {
            let secret = token::generate();
            self.users
                .set_remember_hash(user.id, Some(&token::sha256_hex(&secret)))
                .await
                .map_err(|_| AppError::AuthenticationUnavailable)?;
            Some(secret)
        } else {
            None
        };

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome::Success {
            user,
            remember_secret,
        })
    }

    /// Resolves the request's identity: session first, remember cookie as
    /// the fallback. The cookie path populates the session for subsequent
    /// requests but never rotates or reissues the remember token.
    pub async fn resolve(
        &self,
        session: &SessionContext,
        remember_cookie: Option<&str>,
    ) -> Result<Resolved, AppError> {
        if let Some(user_id) = session.user_id() {
            let user = self
                .users
                .find_by_id(user_id)
                .await
                .map_err(|_| AppError::AuthenticationUnavailable)?;
            match user {
                Some(user) if user.is_active => {
                    return Ok(Resolved {
                        user: Some(user),
                        clear_remember: false,
                    });
                }
                // Deleted or deactivated since login; the session entry is stale.
                _ => session.clear_user(),
            }
        }

        let cookie = match remember_cookie.filter(|c| !c.is_empty()) {
            Some(cookie) => cookie,
            None => {
                return Ok(Resolved {
                    user: None,
                    clear_remember: false,
                });
            }
        };

        let user = self
            .users
            .find_by_remember_hash(&token::sha256_hex(cookie))
            .await
            .map_err(|_| AppError::AuthenticationUnavailable)?;

        match user {
            Some(user) => {
                session.set_user(user.id, &user.email, user.role);
                Ok(Resolved {
                    user: Some(user),
                    clear_remember: false,
                })
            }
            None => Ok(Resolved {
                user: None,
                clear_remember: true,
            }),
        }
    }

    /// Tears down the authenticated state. Safe to call when nobody is
    /// logged in.
    pub async fn logout(&self, session: &SessionContext) -> Result<(), AppError> {
        if let Some(user_id) = session.user_id() {
            self.users
                .set_remember_hash(user_id, None)
                .await
                .map_err(|_| AppError::AuthenticationUnavailable)?;
            tracing::info!(user_id, "User logged out");
        }
        session.destroy();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::auth::password::hash_password;

    #[derive(Default)]
    struct MemoryCredentialStore {
        users: Mutex<HashMap<i64, User>>,
    }

    impl MemoryCredentialStore {
        fn with_user(user: User) -> Arc<Self> {
            let store = Self::default();
            store.users.lock().unwrap().insert(user.id, user);
            Arc::new(store)
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn find_for_auth(&self, email: &str) -> Result<Option<User>, AppError> {
            let users = self.users.lock().unwrap();
            Ok(users
                .values()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_remember_hash(&self, hash: &str) -> Result<Option<User>, AppError> {
            let users = self.users.lock().unwrap();
            Ok(users
                .values()
                .find(|u| u.is_active && u.remember_token.as_deref() == Some(hash))
                .cloned())
        }

        async fn record_login(&self, id: i64) -> Result<(), AppError> {
            if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
                user.last_login = Some(Utc::now());
            }
            Ok(())
        }

        async fn set_remember_hash(&self, id: i64, hash: Option<&str>) -> Result<(), AppError> {
            if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
                user.remember_token = hash.map(String::from);
            }
            Ok(())
        }
    }

    fn test_user(id: i64, email: &str, password: &str, active: bool) -> User {
        User {
            id,
            email: email.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role: Role::User,
            is_active: active,
            password_hash: hash_password(password).unwrap(),
            remember_token: None,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn login_succeeds_and_rotates_session() {
        let store = MemoryCredentialStore::with_user(test_user(1, "a@example.com", "pw-1234", true));
        let auth = AuthManager::new(store.clone());
        let session = SessionContext::fresh();
        let before = session.id();

        let outcome = auth
            .login(&session, "A@Example.COM", "pw-1234", false)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            LoginOutcome::Success { remember_secret: None, .. }
        ));
        assert_eq!(session.user_id(), Some(1));
        assert_ne!(session.id(), before);

        let resolved = auth.resolve(&session, None).await.unwrap();
        assert_eq!(resolved.user.unwrap().id, 1);
    }

    #[tokio::test]
    async fn wrong_password_writes_no_session_state() {
        let store = MemoryCredentialStore::with_user(test_user(1, "a@example.com", "pw-1234", true));
        let auth = AuthManager::new(store);
        let session = SessionContext::fresh();

        let outcome = auth.login(&session, "a@example.com", "nope", false).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Rejected));
        assert_eq!(session.user_id(), None);
    }

    #[tokio::test]
    async fn unknown_email_and_inactive_user_are_both_rejected() {
        let store = MemoryCredentialStore::with_user(test_user(1, "a@example.com", "pw-1234", false));
        let auth = AuthManager::new(store);
        let session = SessionContext::fresh();

        let outcome = auth.login(&session, "a@example.com", "pw-1234", false).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Rejected));
        let outcome = auth.login(&session, "nobody@example.com", "pw-1234", false).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Rejected));
    }

    #[tokio::test]
    async fn remember_cookie_resolves_without_reissuing() {
        let store = MemoryCredentialStore::with_user(test_user(1, "a@example.com", "pw-1234", true));
        let auth = AuthManager::new(store.clone());
        let session = SessionContext::fresh();

        let outcome = auth
            .login(&session, "a@example.com", "pw-1234", true)
            .await
            .unwrap();
        let secret = match outcome {
            LoginOutcome::Success { remember_secret: Some(s), .. } => s,
            _ => panic!("expected a remember secret"),
        };
        let stored_hash = store.users.lock().unwrap()[&1].remember_token.clone();
        assert_eq!(stored_hash.as_deref(), Some(token::sha256_hex(&secret).as_str()));

        // Fresh browser visit: empty session, cookie present.
        let fresh = SessionContext::fresh();
        let resolved = auth.resolve(&fresh, Some(&secret)).await.unwrap();
        assert_eq!(resolved.user.unwrap().id, 1);
        assert!(!resolved.clear_remember);
        assert_eq!(fresh.user_id(), Some(1));
        // Token stays as-is; resolution is read-only.
        assert_eq!(store.users.lock().unwrap()[&1].remember_token, stored_hash);
    }

    #[tokio::test]
    async fn garbage_remember_cookie_clears_and_stays_anonymous() {
        let store = MemoryCredentialStore::with_user(test_user(1, "a@example.com", "pw-1234", true));
        let auth = AuthManager::new(store);
        let session = SessionContext::fresh();

        let resolved = auth.resolve(&session, Some("not-a-real-token")).await.unwrap();
        assert!(resolved.user.is_none());
        assert!(resolved.clear_remember);
        assert_eq!(session.user_id(), None);
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_clears_remember_hash() {
        let store = MemoryCredentialStore::with_user(test_user(1, "a@example.com", "pw-1234", true));
        let auth = AuthManager::new(store.clone());
        let session = SessionContext::fresh();

        auth.login(&session, "a@example.com", "pw-1234", true).await.unwrap();
        auth.logout(&session).await.unwrap();
        assert!(store.users.lock().unwrap()[&1].remember_token.is_none());
        assert_eq!(session.user_id(), None);
        assert!(session.is_destroyed());

        // Second logout on the same torn-down session is a no-op.
        auth.logout(&session).await.unwrap();
        assert_eq!(session.user_id(), None);
    }

    #[tokio::test]
    async fn deactivated_user_loses_an_existing_session() {
        let store = MemoryCredentialStore::with_user(test_user(1, "a@example.com", "pw-1234", true));
        let auth = AuthManager::new(store.clone());
        let session = SessionContext::fresh();
        auth.login(&session, "a@example.com", "pw-1234", false).await.unwrap();

        store.users.lock().unwrap().get_mut(&1).unwrap().is_active = false;
        let resolved = auth.resolve(&session, None).await.unwrap();
        assert!(resolved.user.is_none());
        assert_eq!(session.user_id(), None);
    }
}
