use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rss_to_md_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "rss-to-md")]
#[command(author, version, about = "MCP server that converts RSS feeds to Markdown")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the `rss_to_md` tool over stdio (default)
    Serve,
    /// Convert a single feed and print the Markdown
    Convert {
        /// RSS feed URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Some(Commands::Serve) | None => {
            commands::serve::run(&config).await?;
            // Tokio's stdin reader sits on a blocking thread that would
            // otherwise hold up runtime shutdown
            std::process::exit(0);
        }
        Some(Commands::Convert { url }) => commands::convert::run(&config, &url).await,
    }
}
