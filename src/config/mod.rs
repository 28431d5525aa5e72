use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub session_cookie_name: String,
    pub session_lifetime_secs: u64,
    pub session_rotation_secs: u64,
    pub remember_lifetime_secs: u64,
    pub cookie_secure: bool,
    pub upload_dir: String,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let session_lifetime = env::var("SESSION_LIFETIME")
            .unwrap_or_default()
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(8);
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "linkdeck_session".to_string()),
            session_lifetime_secs: session_lifetime * 3600,
            session_rotation_secs: env::var("SESSION_ROTATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            remember_lifetime_secs: env::var("REMEMBER_LIFETIME")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30 * 24 * 3600),
            cookie_secure: env::var("COOKIE_SECURE").map(|v| v != "false").unwrap_or(true),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50 * 1024 * 1024),
        })
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    pub fn session_rotation(&self) -> Duration {
        Duration::from_secs(self.session_rotation_secs)
    }

    pub fn remember_lifetime(&self) -> Duration {
        Duration::from_secs(self.remember_lifetime_secs)
    }
}
