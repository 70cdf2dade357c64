//! favsync main entry point
//!
//! This is the command-line interface for the favorites mirror.

use anyhow::{bail, Context};
use clap::Parser;
use favsync::config::{load_config_with_hash, Config};
use favsync::model::Provider;
use favsync::output::{print_backfill_summary, print_run_summary};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// favsync: an incremental favorites mirror
///
/// favsync walks a user's favorites on a gallery site, downloads every
/// submission it has not mirrored yet, creates thumbnails and keeps the
/// metadata in a local SQLite database. Runs stop once they reach items
/// that are already mirrored.
#[derive(Parser, Debug)]
#[command(name = "favsync")]
#[command(version = "1.0.0")]
#[command(about = "An incremental favorites mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Site to sync
    #[arg(value_name = "PROVIDER", required_unless_present_any = ["thumbnails", "stats"])]
    provider: Option<Provider>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Create missing thumbnails for already downloaded media and exit
    #[arg(long, conflicts_with = "stats")]
    thumbnails: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "thumbnails")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let providers = match cli.provider {
        Some(provider) => vec![provider],
        None => config.configured_providers(),
    };

    if cli.stats {
        handle_stats(&config, &providers)
    } else if cli.thumbnails {
        handle_thumbnails(&config, &providers).await
    } else {
        match cli.provider {
            Some(provider) => handle_sync(&config, provider, &config_hash).await,
            None => bail!("No provider given"),
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("favsync=info,warn"),
            1 => EnvFilter::new("favsync=debug,info"),
            2 => EnvFilter::new("favsync=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, providers: &[Provider]) -> anyhow::Result<()> {
    use favsync::output::{load_statistics, print_statistics};
    use favsync::storage::open_storage;

    println!("Database: {}\n", config.database.path.display());

    let storage = open_storage(&config.database.path).context("Failed to open database")?;
    let stats = load_statistics(&storage, providers)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --thumbnails mode: fills in missing thumbnails
async fn handle_thumbnails(config: &Config, providers: &[Provider]) -> anyhow::Result<()> {
    if providers.is_empty() {
        bail!("No provider is configured");
    }

    let results = favsync::sync::rebuild_thumbnails(config, providers).await?;
    print_backfill_summary(&results);
    Ok(())
}

/// Handles the main sync operation
async fn handle_sync(config: &Config, provider: Provider, config_hash: &str) -> anyhow::Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current item");
            flag.store(true, Ordering::SeqCst);
        }
    });

    match favsync::sync::run_sync(config, provider, config_hash, cancel).await {
        Ok(summary) => {
            print_run_summary(provider, &summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sync of {} failed: {}", provider, e);
            Err(e.into())
        }
    }
}
