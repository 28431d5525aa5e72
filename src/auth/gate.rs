use sqlx::PgPool;

use crate::auth::manager::Identity;
use crate::error::AppError;
use crate::models::page::Page;
use crate::models::permission::{Permission, PermissionGrant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Pure decision function over the current role/grant state: admins bypass
/// everything, anonymous requests are denied, otherwise the grant lattice
/// decides. No side effects; callers map `Deny` to 401 or 403.
pub fn decide(
    identity: Option<&Identity>,
    grant: Option<Permission>,
    required: Permission,
) -> Decision {
    let Some(identity) = identity else {
        return Decision::Deny;
    };
    if identity.is_admin() {
        return Decision::Allow;
    }
    match grant {
        Some(granted) if granted.satisfies(required) => Decision::Allow,
        _ => Decision::Deny,
    }
}

/// Page-level authorization over the grant table.
#[derive(Clone)]
pub struct AccessGate {
    pool: PgPool,
}

impl AccessGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        page_id: i64,
        required: Permission,
    ) -> Result<Decision, AppError> {
        // Admins skip the grant lookup entirely.
        let identity = match identity {
            None => return Ok(Decision::Deny),
            Some(identity) if identity.is_admin() => return Ok(Decision::Allow),
            Some(identity) => identity,
        };
        let grant = PermissionGrant::find_for(&self.pool, identity.user_id, page_id).await?;
        Ok(decide(Some(identity), grant, required))
    }

    /// Single source of truth for navigation: every page the identity can
    /// read, in sort order, and nothing else.
    pub async fn accessible_pages(&self, identity: &Identity) -> Result<Vec<Page>, AppError> {
        if identity.is_admin() {
            Page::list_active(&self.pool).await
        } else {
            Page::list_granted(&self.pool, identity.user_id).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: 10,
            email: "u@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn admin_bypasses_even_with_no_grant() {
        let admin = identity(Role::Admin);
        assert_eq!(decide(Some(&admin), None, Permission::Read), Decision::Allow);
        assert_eq!(decide(Some(&admin), None, Permission::Edit), Decision::Allow);
    }

    #[test]
    fn anonymous_is_always_denied() {
        assert_eq!(decide(None, Some(Permission::Edit), Permission::Read), Decision::Deny);
        assert_eq!(decide(None, None, Permission::Read), Decision::Deny);
    }

    #[test]
    fn missing_grant_denies() {
        let user = identity(Role::User);
        assert_eq!(decide(Some(&user), None, Permission::Read), Decision::Deny);
    }

    #[test]
    fn read_grant_satisfies_only_read() {
        let user = identity(Role::User);
        assert_eq!(
            decide(Some(&user), Some(Permission::Read), Permission::Read),
            Decision::Allow
        );
        assert_eq!(
            decide(Some(&user), Some(Permission::Read), Permission::Edit),
            Decision::Deny
        );
    }

    #[test]
    fn edit_grant_satisfies_read_and_edit() {
        let user = identity(Role::User);
        assert_eq!(
            decide(Some(&user), Some(Permission::Edit), Permission::Read),
            Decision::Allow
        );
        assert_eq!(
            decide(Some(&user), Some(Permission::Edit), Permission::Edit),
            Decision::Allow
        );
    }
}
