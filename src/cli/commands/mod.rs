//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod convert;
mod parse_url;
mod search;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "pricescout")]
#[command(about = "Marketplace product search over headless-browser scraping")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./pricescout.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP search API
    Serve {
        /// Address to bind (overrides PRICESCOUT_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides PRICESCOUT_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one search and print the results as JSON
    Search {
        /// Marketplace: ebay, aliexpress (ali), amazon
        marketplace: String,
        /// Search keyword
        keyword: String,
        /// Maximum number of items (1-200)
        #[arg(short, long)]
        limit: Option<i64>,
        /// Scrape a saved results page instead of launching a browser
        #[arg(long)]
        html: Option<PathBuf>,
        /// Print price snapshots instead of raw items
        #[arg(long)]
        snapshot: bool,
    },

    /// Extract the marketplace and item id from a product URL
    ParseUrl {
        /// Product page URL
        url: String,
    },

    /// Convert an amount between currencies
    Convert {
        amount: f64,
        /// Source currency code (e.g., KRW)
        from: String,
        /// Target currency code (e.g., USD)
        to: String,
        /// Use the built-in rate table instead of fetching live rates
        #[arg(long)]
        offline: bool,
    },
}

impl Cli {
    /// Resolve settings from the config file and environment.
    pub async fn load_settings(&self) -> anyhow::Result<Settings> {
        Ok(Settings::load(self.config.as_deref()).await?)
    }
}

/// Run the parsed command with resolved settings.
pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { host, port } => serve::cmd_serve(settings, host, port).await,
        Commands::Search {
            marketplace,
            keyword,
            limit,
            html,
            snapshot,
        } => {
            search::cmd_search(
                &settings,
                &marketplace,
                &keyword,
                limit,
                html.as_deref(),
                snapshot,
            )
            .await
        }
        Commands::ParseUrl { url } => parse_url::cmd_parse_url(&url),
        Commands::Convert {
            amount,
            from,
            to,
            offline,
        } => convert::cmd_convert(amount, &from, &to, offline).await,
    }
}
