use anyhow::{Context, Result};
use aw2graphite::Service;
use aw_metrics::TracingService;
use aw_models::Settings;
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aw2graphite-server")]
#[command(about = "Receives Ambient Weather custom-server pushes and forwards them to Graphite")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(long, short, default_value = "config.json")]
    config: PathBuf,
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => warn!("Unable to listen for shutdown signal: {}", err),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let log_level = TracingService::init(settings.loglevel.as_deref())?;

    info!("Starting aw2graphite");

    let bind = settings.bind_address();
    let service = Service::build(args.config.clone(), settings, Some(log_level)).await?;

    let watcher = tokio::spawn(service.watcher.start());

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    aw_api::start_server(listener, service.state, shutdown_signal()).await?;

    watcher.abort();
    info!("aw2graphite shutdown complete");
    Ok(())
}
