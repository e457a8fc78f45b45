//! sisarv-sync - Botanical inventory synchronization CLI
//!
//! Reads a dataset in the canonical record schema (JSON), authenticates
//! against the portal and reconciles the dataset into the single inventory
//! found there. Progress and skips are rendered from the engine's event
//! stream; Ctrl-C requests cooperative cancellation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sisarv_common::{EventBus, InventoryRecord, SyncEvent, SyncTables};
use sisarv_sync::services::PortalClient;
use sisarv_sync::SyncOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "sisarv-sync", about = "Synchronize a botanical inventory dataset into SisArv")]
struct Args {
    /// Dataset file: a JSON array of canonical inventory records
    #[arg(long)]
    input: PathBuf,

    /// Portal login user
    #[arg(long)]
    username: String,

    /// Portal password (prefer the environment variable)
    #[arg(long, env = "SISARV_PASSWORD", hide_env_values = true)]
    password: String,

    /// Portal base URL
    #[arg(long, default_value = "https://sisarv.rio.gov.br")]
    base_url: String,

    /// Override the built-in sync tables with a TOML file
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Resolve names and report unmatched records without submitting
    #[arg(long)]
    no_submit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let tables = match &args.tables {
        Some(path) => SyncTables::load(path)?,
        None => SyncTables::builtin(),
    };

    let raw = std::fs::read_to_string(&args.input)?;
    let records: Vec<InventoryRecord> = serde_json::from_str(&raw)?;
    info!(count = records.len(), input = %args.input.display(), "dataset loaded");

    let event_bus = EventBus::new(256);
    let mut rx = event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                SyncEvent::RecordProgress { current, total, .. } => {
                    info!("progress: {current}/{total}");
                }
                SyncEvent::LogMessage { message, .. } => info!("{message}"),
                SyncEvent::RunStarted { total_records, .. } => {
                    info!("run started: {total_records} record(s)");
                }
                SyncEvent::RunFinished {
                    success,
                    unmatched_count,
                    ..
                } => {
                    info!("run finished: success={success} unmatched={unmatched_count}");
                }
            }
        }
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested, stopping at the next checkpoint");
                cancel.cancel();
            }
        });
    }

    let transport = PortalClient::new(&args.base_url)?;
    let mut orchestrator = SyncOrchestrator::new(transport, tables, event_bus.clone(), cancel);
    if args.no_submit {
        orchestrator = orchestrator.without_submission();
    }

    let result = orchestrator.run(&args.username, &args.password, &records).await;

    drop(orchestrator);
    drop(event_bus);
    let _ = printer.await;

    if !result.unmatched.is_empty() {
        warn!("records without a portal match:");
        for entry in &result.unmatched {
            warn!(
                "  nº {}: {:?} / {:?}",
                entry.project_number, entry.common_name, entry.scientific_name
            );
        }
    }

    match result.error {
        None => Ok(()),
        Some(message) => anyhow::bail!(message),
    }
}
