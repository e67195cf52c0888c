//! FreshCart CLI - a terminal front end for the cart core.
//!
//! # Usage
//!
//! ```bash
//! # Interactive cart shell (default)
//! fc-cli
//! fc-cli shell
//!
//! # List products and prices
//! fc-cli catalog
//! ```
//!
//! Configuration comes from the environment (or a `.env` file); see
//! `freshcart_storefront::config`. `FRESHCART_API_URL` is required.

#![cfg_attr(not(test), forbid(unsafe_code))]
// The shell talks to the user on stdout; logs go to stderr.
#![allow(clippy::print_stdout)]

use clap::{Parser, Subcommand};

use freshcart_storefront::Storefront;
use freshcart_storefront::config::StorefrontConfig;
use freshcart_storefront::error::Result;

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "fc-cli")]
#[command(author, version, about = "FreshCart cart shell")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive cart shell
    Shell,
    /// List products with offer prices
    Catalog,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing();

    if let Err(e) = run(cli, config).await {
        e.report();
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<()> {
    let storefront = Storefront::new(config)?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => commands::shell::run(&storefront).await?,
        Commands::Catalog => commands::catalog::list(&storefront).await?,
    }
    Ok(())
}
