pub mod link;
pub mod page;
pub mod permission;
pub mod user;

pub use link::{Link, LinkKind};
pub use page::Page;
pub use permission::{Permission, PermissionGrant};
pub use user::{Role, User};
