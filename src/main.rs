use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use feedhub::feed::HttpFetcher;
use feedhub::notify::TelegramNotifier;
use feedhub::processor::Processor;
use feedhub::web::{AppState, WebServer};
use feedhub::{Config, Database};

/// Merge RSS/Atom sources into podcast feeds and relay new items to Telegram.
#[derive(Parser, Debug)]
#[command(name = "feedhub", version, about, long_about = None)]
struct Args {
    /// Configuration file.
    #[arg(env = "FEEDHUB_CONFIG", default_value = "feedhub.toml")]
    config: PathBuf,

    /// Relay a single source instead of the configured feeds.
    #[arg(long)]
    feed: Option<String>,

    /// Telegram channel for single-source mode.
    #[arg(long, default_value = "")]
    channel: String,

    /// Update interval in seconds for single-source mode.
    #[arg(long, default_value_t = 600)]
    interval: u64,
}

fn load_config(args: &Args) -> feedhub::Result<Config> {
    match &args.feed {
        Some(url) => {
            let mut config = Config::single_feed(url, &args.channel, args.interval);
            config.apply_env_overrides();
            Ok(config)
        }
        None => Config::load_with_env(&args.config),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = feedhub::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedhub::logging::init_console_only(&config.logging.level);
    }

    info!("feedhub {}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> feedhub::Result<()> {
    config.validate()?;
    let config = Arc::new(config);

    let db = Database::open(&config.database.path).await?;
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let notifier = Arc::new(TelegramNotifier::new(&config.telegram)?);
    if !notifier.is_enabled() {
        warn!("telegram token is not set, notifications are disabled");
    }

    let app_state = Arc::new(AppState::new(Arc::clone(&config), db.clone())?);
    let server = WebServer::new(&config.server, app_state)?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let processor = Processor::new(Arc::clone(&config), db, fetcher, notifier);
    let processor_cancel = cancel.clone();
    let processor_task = tokio::spawn(async move { processor.run(processor_cancel).await });

    let result = server.run(cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = processor_task.await {
        error!("processor task failed: {}", e);
    }
    result
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("shutdown requested");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}
