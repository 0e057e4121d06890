use clap::Parser;
use feed_cooker::{cook_all, CookerConfig, DiskResponseCache, FeedAggregator, RunOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Cook several syndication feeds into one merged JSON Feed and Atom feed.
#[derive(Parser, Debug)]
#[command(name = "feed-cooker", version)]
struct Cli {
    /// Recipe file
    #[arg(short, long, default_value = "feeds.toml")]
    config: PathBuf,

    /// Where the cooked feeds are written
    #[arg(short, long, default_value = "well-done")]
    output_dir: PathBuf,

    /// Where the last response of every source is kept
    #[arg(long, default_value = ".cache/responses")]
    cache_dir: PathBuf,

    #[arg(long, env = "GITHUB_REPOSITORY_OWNER")]
    repository_owner: Option<String>,

    /// owner/name
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Only cook the feed with this name
    #[arg(long)]
    only: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    info!("Starting feed cooker with {}", cli.config.display());

    let config = CookerConfig::from_file(&cli.config).await?;

    // Flags and environment win over the config file
    let repository_owner = cli
        .repository_owner
        .or_else(|| config.repository_owner.clone())
        .ok_or_else(|| anyhow::anyhow!("repository owner is not set (--repository-owner or GITHUB_REPOSITORY_OWNER)"))?;
    let repository = cli
        .repository
        .or_else(|| config.repository.clone())
        .ok_or_else(|| anyhow::anyhow!("repository is not set (--repository or GITHUB_REPOSITORY)"))?;

    let cache = Arc::new(DiskResponseCache::new(&cli.cache_dir));
    let aggregator = FeedAggregator::with_reqwest(config.fetch_config(), cache)?;

    let options = RunOptions {
        output_dir: cli.output_dir,
        repository_owner,
        repository,
        only: cli.only,
    };

    let cooked = cook_all(&config, &aggregator, &options).await.map_err(|e| {
        error!("Cooking failed: {}", e);
        e
    })?;

    for feed in &cooked {
        info!(
            "{}: {} items from {}/{} sources",
            feed.name,
            feed.items,
            feed.sources_ok,
            feed.sources_ok + feed.sources_failed
        );
    }

    info!("Feed cooker finished");
    Ok(())
}
