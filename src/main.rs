/// Entry point: one incremental metric sync run
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use metricsync::{
    clients::{IdentityClient, IngestClient, TelemetryClient},
    config::load_config,
    sync::{FileWatermarkStore, SyncOrchestrator},
    Config,
};

#[derive(Debug, Parser)]
#[command(name = "metricsync", about = "Incremental instance utilization sync")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "CONFIG_PATH", default_value = "config.toml")]
    config: PathBuf,

    /// Compute and persist locally, but do not post to the ingestion endpoint
    #[arg(long)]
    skip_delivery: bool,

    /// Print the JSON run report to stdout
    #[arg(long)]
    print_report: bool,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("metricsync={},warn", config.log_level)));

    if config.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config);

    info!("Starting metric sync...");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_sec))
        .build()
        .context("building HTTP client")?;

    let identity = IdentityClient::login(
        http.clone(),
        &config.endpoints.identity_url,
        &config.credentials,
    )
    .await
    .context("authenticating with the identity service")?;
    identity.token().ensure_valid()?;

    let telemetry = Arc::new(TelemetryClient::new(
        http.clone(),
        &config.endpoints.telemetry_url,
        identity.token().clone(),
    ));
    let watermark = Arc::new(FileWatermarkStore::new(&config.sync.watermark_path));

    let mut orchestrator = SyncOrchestrator::new(
        config.sync.clone(),
        telemetry.clone(),
        Arc::new(identity),
        telemetry,
        watermark,
    );
    if cli.skip_delivery {
        info!("Delivery disabled by --skip-delivery");
    } else {
        orchestrator = orchestrator.with_sink(Arc::new(IngestClient::new(
            http,
            &config.endpoints.ingest_url,
        )));
    }

    let outcome = match orchestrator.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Sync run failed: {} ({})", e, e.error_code());
            return Err(e.into());
        }
    };

    if cli.print_report {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    }

    Ok(())
}
