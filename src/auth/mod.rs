pub mod csrf;
pub mod gate;
pub mod manager;
pub mod password;
pub mod session;
pub mod token;

pub use gate::{AccessGate, Decision};
pub use manager::{AuthManager, CredentialStore, CurrentIdentity, Identity, LoginOutcome, PgCredentialStore};
pub use session::{SessionContext, SessionStore};
