//! Schema migration command

use anyhow::{Context, Result};
use clap::Parser;

use dmchat_server::db::{create_pool_with_connect_options, migrations};

use crate::config::DatabaseArgs;

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,
}

/// Apply migrations and exit
pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let connect_options = args.db.connect_options()?;

    let pool = create_pool_with_connect_options(connect_options, args.db.max_connections)
        .await
        .context("Failed to create database pool")?;

    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    pool.close().await;
    Ok(())
}
