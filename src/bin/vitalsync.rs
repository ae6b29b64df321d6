//! VitalSync CLI
//!
//! Commands:
//! - scan: discover nearby wearables over BLE
//! - sync: run one sync cycle over a captured aggregator payload
//! - status: report connectivity for a captured payload

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use vitalsync::store::StaticIdentity;
use vitalsync::{
    AggregatorClient, BtleplugTransport, MemoryStore, RadioLinkManager, ReplayBackend, SyncEngine,
    UserId, VITALSYNC_VERSION,
};

/// VitalSync - acquire and aggregate wearable health telemetry
#[derive(Parser)]
#[command(name = "vitalsync")]
#[command(version = VITALSYNC_VERSION)]
#[command(about = "Acquire and aggregate wearable health telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for nearby wearables over the radio link
    Scan {
        /// Scan window in seconds
        #[arg(long, default_value = "15")]
        timeout: u64,
    },
    /// Run one sync cycle over a captured aggregator payload
    Sync {
        /// Capture file: {"Steps": [...], "HeartRate": [...], ...}
        #[arg(short, long)]
        input: PathBuf,

        /// Legacy numeric user id to tag persisted rows with
        #[arg(long, default_value = "1")]
        user: u32,
    },
    /// Report connectivity status for a captured payload
    Status {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "1")]
        user: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Scan { timeout } => {
            let transport = BtleplugTransport::new()
                .await
                .map_err(|err| err.to_string())?;
            let manager = RadioLinkManager::new(Arc::new(transport));
            let mut devices = manager
                .scan(std::time::Duration::from_secs(timeout))
                .await
                .map_err(|err| err.to_string())?;
            println!("scanning for {timeout}s...");
            while let Some(device) = devices.recv().await {
                println!(
                    "{}  {}  rssi={}  brand={}",
                    device.device_id,
                    device.name.as_deref().unwrap_or("(unnamed)"),
                    device.rssi.map(|r| r.to_string()).unwrap_or_default(),
                    device.brand.as_str(),
                );
            }
            Ok(())
        }
        Commands::Sync { input, user } => {
            let engine = engine_for(&input, user)?;
            let outcome = engine.sync_once().await;
            if let Some(err) = outcome.store_error {
                eprintln!("warning: persistence failed: {err}");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome.summary).map_err(|err| err.to_string())?
            );
            println!("records persisted: {}", outcome.records_persisted);
            Ok(())
        }
        Commands::Status { input, user } => {
            let engine = engine_for(&input, user)?;
            engine.sync_once().await;
            let status = engine.connectivity_status().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&status).map_err(|err| err.to_string())?
            );
            Ok(())
        }
    }
}

fn engine_for(input: &PathBuf, user: u32) -> Result<Arc<SyncEngine>, String> {
    let text = fs::read_to_string(input).map_err(|err| format!("{}: {err}", input.display()))?;
    let backend = ReplayBackend::from_json(&text).map_err(|err| err.to_string())?;
    let engine = SyncEngine::new(
        Arc::new(AggregatorClient::new(Arc::new(backend))),
        Arc::new(MemoryStore::new()),
        Arc::new(StaticIdentity(Some(UserId::from_legacy_numeric(user)))),
    );
    Ok(Arc::new(engine))
}
