//! dmchat-server: registration, login and direct-message chat over HTTP
//!
//! Server-rendered pages backed by PostgreSQL. Passwords are hashed with
//! Argon2id, logins are server-side sessions referenced by a cookie, and
//! one-shot notices travel across redirects as flash messages.

pub mod auth;
pub mod db;
pub mod http;
pub mod models;
pub mod views;

pub use http::{build_router, run_server, AppState, ServerConfig, ServerError};
