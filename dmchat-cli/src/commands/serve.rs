//! HTTP server command
//!
//! Applies migrations, then serves until Ctrl+C or SIGTERM.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use dmchat_server::auth::session::DEFAULT_SESSION_TTL_HOURS;
use dmchat_server::auth::SessionConfig;
use dmchat_server::db::{create_pool_with_connect_options, migrations};
use dmchat_server::{run_server, ServerConfig};

use crate::config::DatabaseArgs;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "DMCHAT_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub db: DatabaseArgs,

    /// Mark session cookies Secure (serve behind HTTPS)
    #[arg(long, env = "DMCHAT_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// How long a login lasts, in hours
    #[arg(long, env = "DMCHAT_SESSION_TTL_HOURS", default_value_t = DEFAULT_SESSION_TTL_HOURS)]
    pub session_ttl_hours: i64,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let connect_options = args.db.connect_options()?;

    tracing::info!("Starting dmchat server on {}", args.bind);

    let pool = create_pool_with_connect_options(connect_options, args.db.max_connections)
        .await
        .context("Failed to create database pool")?;

    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    let config = ServerConfig {
        bind_addr: args.bind,
        session: SessionConfig::with_ttl_hours(args.session_ttl_hours, args.secure_cookies),
    };

    // Blocks until shutdown
    run_server(pool, config).await.context("Server error")?;

    Ok(())
}
