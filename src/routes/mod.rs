pub mod auth;
pub mod download;
pub mod links;
pub mod pages;
pub mod permissions;
pub mod users;
