//! Database connection settings shared by subcommands

use anyhow::{bail, Context, Result};
use clap::Args;
use sqlx::postgres::PgConnectOptions;

use dmchat_server::db::pool::DEFAULT_MAX_CONNECTIONS;

/// Database arguments
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database URL (falls back to DB_HOST/DB_PORT/DB_NAME/DB_USER/DB_PASSWORD)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl DatabaseArgs {
    /// Connection options from the flag/env URL, or from the discrete DB_* variables.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.database_url {
            return url
                .parse::<PgConnectOptions>()
                .context("DATABASE_URL is not a valid PostgreSQL URL");
        }
        match options_from_parts(|key| std::env::var(key).ok())? {
            Some(options) => Ok(options),
            None => bail!(
                "no database configured: set --database-url, DATABASE_URL, or at least DB_NAME"
            ),
        }
    }
}

/// Build connection options from discrete settings.
///
/// Requires `DB_NAME`; host defaults to localhost and port to 5432. Values are
/// passed through as-is, so IPv6 hosts and passwords with URL metacharacters
/// need no escaping.
pub fn options_from_parts(
    var: impl Fn(&str) -> Option<String>,
) -> Result<Option<PgConnectOptions>> {
    let var = |key: &str| var(key).filter(|v| !v.is_empty());

    let Some(name) = var("DB_NAME") else {
        return Ok(None);
    };
    let host = var("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = match var("DB_PORT") {
        Some(port) => port
            .parse::<u16>()
            .with_context(|| format!("DB_PORT is not a valid port: {}", port))?,
        None => 5432,
    };

    let mut options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .database(&name);
    if let Some(user) = var("DB_USER") {
        options = options.username(&user);
    }
    if let Some(password) = var("DB_PASSWORD") {
        options = options.password(&password);
    }

    Ok(Some(options))
}
