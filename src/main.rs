mod cache;
mod config;
mod discord;
mod error;
mod pager;
mod tba;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pitbot")]
#[command(about = "A Discord bot for FRC stats from The Blue Alliance")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pitbot/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;

  // Both credentials are required; fail before touching the network.
  let tba_api_key = config::Config::tba_api_key()?;
  let discord_token = config::Config::discord_token()?;

  let store: Arc<dyn cache::CacheStore> = if config.ephemeral_cache {
    Arc::new(cache::MemoryStore::new())
  } else {
    Arc::new(cache::SqliteStore::open(config.cache_path.as_deref())?)
  };
  let transport = Arc::new(tba::transport::HttpTransport::new(&tba_api_key)?);
  let tba = tba::TbaClient::new(transport, store);

  discord::bot::run(&config, tba, discord_token).await
}
