//! journey-cache - pre-cache a journey deployment and serve requests offline.
//!
//! Plays the host role for the core library: `install` populates the
//! deployment's cache bucket from the origin, `fetch` answers requests the way
//! an intercepting worker would (cache first, network on a miss).

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use journey_cache_core::config::ORIGIN_ENV;
use journey_cache_core::Deployment;

#[derive(Parser, Debug)]
#[command(name = "journey-cache")]
#[command(about = "Pre-cache a journey deployment and serve requests offline")]
#[command(version)]
pub struct Args {
    /// Path to config file (default: $XDG_CONFIG_HOME/journey-cache/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Origin the assets are fetched from
    #[arg(long, global = true, env = ORIGIN_ENV)]
    pub origin: Option<String>,

    /// Directory holding the cache buckets
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Built-in deployment to use (journey-v1, journey-v3)
    #[arg(short, long, global = true)]
    pub deployment: Option<Deployment>,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch every manifest entry into the deployment's cache bucket
    Install,
    /// Answer requests from the cache, falling back to the network
    Fetch {
        /// Paths (or absolute URLs) to request
        #[arg(required = true)]
        paths: Vec<String>,
        /// Write the body of the first response to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List cache buckets in creation order
    Buckets,
    /// List the requests stored in a bucket
    Keys { bucket: String },
    /// Delete a bucket
    Purge { bucket: String },
    /// Show the manifest in effect, resolved against the origin
    Manifest,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // RUST_LOG wins over --verbose
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.verbose);
    info!("journey-cache starting");

    commands::run(args).await
}
