pub mod auth;
pub mod config;
pub mod profile;
pub mod space;
pub mod tickets;
