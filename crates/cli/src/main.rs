use anyhow::{Context, Result};
use aw_ambient::{backfill, AmbientClient, BackfillOptions};
use aw_carbon::{CarbonEndpoint, TcpCarbonSink};
use aw_models::{Operator, Settings};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "aw2graphite-cli")]
#[command(about = "Operator tools for aw2graphite")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List the devices on the account
    Devices,
    /// Push historic records from the REST API to Carbon
    Backfill {
        /// Only this station
        #[arg(long)]
        mac: Option<String>,
        /// Records per device
        #[arg(long, default_value = "288")]
        limit: u32,
        /// Fetch records before this date
        #[arg(long)]
        end_date: Option<String>,
    },
    /// Print the effective settings
    CheckConfig {
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Toml,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Devices => list_devices(&settings).await?,
        Commands::Backfill {
            mac,
            limit,
            end_date,
        } => {
            let opts = BackfillOptions {
                mac,
                limit,
                end_date,
                ..BackfillOptions::default()
            };
            run_backfill(&settings, &opts).await?;
        }
        Commands::CheckConfig { format } => check_config(&settings, format)?,
    }

    Ok(())
}

async fn list_devices(settings: &Settings) -> Result<()> {
    let client = AmbientClient::from_settings(settings)?;
    let devices = client.devices().await?;
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}

async fn run_backfill(settings: &Settings, opts: &BackfillOptions) -> Result<()> {
    let client = AmbientClient::from_settings(settings)?;
    let sink = TcpCarbonSink::new(CarbonEndpoint::from_settings(settings));

    let summary = backfill(&client, &sink, &settings.metric_prefix, opts).await?;
    info!(
        "Backfill done: {} devices, {} records, {} lines, {} failures",
        summary.devices, summary.records, summary.lines, summary.failures
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.failures > 0 {
        anyhow::bail!("{} records could not be sent", summary.failures);
    }
    Ok(())
}

fn check_config(settings: &Settings, format: Format) -> Result<()> {
    println!("{}", render_settings(settings, format)?);
    for warning in threshold_warnings(settings) {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

fn render_settings(settings: &Settings, format: Format) -> Result<String> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(settings)?,
        Format::Toml => toml::to_string_pretty(settings).context("rendering settings as TOML")?,
    })
}

/// Thresholds that can never fire because a part is missing or unknown.
fn threshold_warnings(settings: &Settings) -> Vec<String> {
    settings
        .alert_thresholds
        .iter()
        .filter(|(_, threshold)| {
            let usable = matches!(threshold.operator, Some(op) if op != Operator::Unknown);
            !usable || threshold.threshold.is_none()
        })
        .map(|(key, _)| format!("threshold for {} is incomplete and will never alert", key))
        .collect()
}
