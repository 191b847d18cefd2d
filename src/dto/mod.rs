pub mod auth;
pub mod catalog;
pub mod migration;
pub mod upload;
