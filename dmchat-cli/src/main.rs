//! dmchat CLI - run the direct-message chat server
//!
//! Subcommands:
//! - `serve`: apply migrations and start the HTTP server
//! - `migrate`: apply migrations and exit
//!
//! Settings come from flags, then environment variables, then a `.env`
//! file in the working directory.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "dmchat",
    author,
    version,
    about = "Direct-message chat server: registration, login and one-to-one conversations"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (applies migrations first)
    Serve(commands::serve::ServeArgs),
    /// Create or update the database schema, then exit
    Migrate(commands::migrate::MigrateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; a malformed one is worth knowing about.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: could not load .env: {}", e);
        }
    }

    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug })?;

    match cli.command {
        Commands::Serve(args) => commands::serve::run_serve(args).await?,
        Commands::Migrate(args) => commands::migrate::run_migrate(args).await?,
    }
    Ok(())
}
