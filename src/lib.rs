use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{AccessGate, AuthManager, PgCredentialStore, SessionStore};
use crate::config::Config;

pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod middleware;
pub mod models;
pub mod result;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn auth(&self) -> AuthManager {
        AuthManager::new(Arc::new(PgCredentialStore::new(self.pool.clone())))
    }

    pub fn gate(&self) -> AccessGate {
        AccessGate::new(self.pool.clone())
    }
}
