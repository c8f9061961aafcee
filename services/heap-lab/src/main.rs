//! Heap-Lab demo driver
//!
//! Thin control surface standing in for the external transport layer: picks
//! a scenario, feeds the recorder from a synthetic collection-event source,
//! and periodically logs pause and SLA snapshots.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use heap_lab::controller::ScenarioController;
use heap_lab::events::{spawn_event_consumer, spawn_synthetic_emitter};
use heap_lab::recorder::PauseRecorder;
use heap_lab::sla::SlaTracker;
use heaplab_common::{EngineConfig, RecorderConfig};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Heap-Lab allocation-pressure service CLI
#[derive(Parser)]
#[clap(name = "heap-lab")]
#[clap(about = "Allocation-pressure generator with GC pause observability")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario against a synthetic collection-event source
    Run {
        /// Scenario name (case-insensitive), e.g. STEADY_LOAD
        #[clap(long, default_value = "STEADY_LOAD")]
        mode: String,

        /// How long to run before stopping, in seconds
        #[clap(long, default_value = "60")]
        duration_secs: u64,

        /// Interval between synthetic collection events, in milliseconds
        #[clap(long, default_value = "250")]
        emit_interval_ms: u64,
    },

    /// List available scenarios
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            mode,
            duration_secs,
            emit_interval_ms,
        } => run(&mode, duration_secs, emit_interval_ms).await,
        Commands::List => {
            let controller = ScenarioController::new(EngineConfig::default());
            for info in controller.list_modes() {
                println!(
                    "{:<16} {:>4} MB/s  {}",
                    info.name, info.rate_mb_per_sec, info.description
                );
            }
            Ok(())
        }
    }
}

async fn run(mode: &str, duration_secs: u64, emit_interval_ms: u64) -> Result<()> {
    let controller = ScenarioController::new(EngineConfig::default());
    let recorder = Arc::new(PauseRecorder::new(RecorderConfig::default()));
    let sla = Arc::new(SlaTracker::default());

    let (tx, rx) = mpsc::channel(1024);
    let consumer = spawn_event_consumer(rx, Arc::clone(&recorder), Arc::clone(&sla));
    let emitter = spawn_synthetic_emitter(tx, Duration::from_millis(emit_interval_ms));

    let selected = controller.set_mode_by_name(mode)?;
    info!(scenario = selected.name, duration_secs, "demo run started");

    let mut status_ticks = interval(Duration::from_secs(10));
    status_ticks.tick().await; // immediate first tick
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration_secs);
    loop {
        tokio::select! {
            _ = status_ticks.tick() => {
                let status = controller.status();
                let sla_stats = sla.stats();
                info!(
                    mode = %status.mode,
                    running = status.running,
                    total_pauses = recorder.snapshot().total_events,
                    recent_violations = sla_stats.recent_violations,
                    violation_rate_pct = sla_stats.violation_rate_pct,
                    "status"
                );
            }
            _ = tokio::time::sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    controller.stop();
    emitter.abort();
    drop(consumer);

    let snapshot = recorder.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!("{}", serde_json::to_string_pretty(&sla.stats())?);
    Ok(())
}
