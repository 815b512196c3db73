//! JGL Site server - JSON endpoints for package download counts.

mod handlers;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use jgl_metrics::{
    Aggregator, HttpFetcher, MetricsCache, SourceConfig, TrackedPackage, TtlStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jgl-server")]
#[command(about = "Download counter endpoints for the JGL site")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "81")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Environment file loaded before reading secrets
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// GitHub account owning the repositories counted by github-traffic
    #[arg(long, default_value = jgl_metrics::NetworkConfig::GITHUB_DEFAULT_OWNER)]
    github_owner: String,

    /// Package to report, as <source>:<package>[=<name>] (repeatable)
    #[arg(long = "track", env = "TRACKED_PACKAGES", value_delimiter = ',')]
    tracked: Vec<TrackedPackage>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting JGL site server");

    match dotenv::from_path(&args.env_file) {
        Ok(()) => info!("Loaded environment from {}", args.env_file.display()),
        Err(e) => warn!("No environment file at {}: {}", args.env_file.display(), e),
    }

    let token = github_token();
    if token.is_none() {
        warn!("GH_TOKEN is not set; github-traffic counts will report Not Found");
    }

    let config = SourceConfig::new(token).with_github_owner(args.github_owner);
    let fetcher = HttpFetcher::new(config).context("failed to build upstream HTTP client")?;
    let cache = Arc::new(MetricsCache::new(Arc::new(TtlStore::new()), Arc::new(fetcher)));

    let tracked = if args.tracked.is_empty() {
        TrackedPackage::defaults()
    } else {
        args.tracked
    };
    for package in &tracked {
        info!("Tracking {}", package);
    }
    let aggregator = Aggregator::new(cache.clone(), tracked);

    let (addr, handle) = server::start_server(
        cache,
        aggregator,
        &args.host,
        args.port,
        server::shutdown_signal(),
    )
    .await?;
    info!("Server running on {}", addr);

    handle.await.context("server task panicked")??;
    info!("Server stopped");

    Ok(())
}

/// GitHub token from the environment, accepting the legacy lowercase name.
fn github_token() -> Option<String> {
    std::env::var("GH_TOKEN")
        .or_else(|_| std::env::var("gh_token"))
        .ok()
}
