//! web-noise CLI
//!
//! Loads configuration and browser profiles, then hands off to the
//! orchestrator. A fatal load error exits non-zero before any session
//! starts; ctrl-c winds sessions down cooperatively.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use web_noise::browser::ProfilePool;
use web_noise::orchestrator::{Orchestrator, OrchestratorConfig};
use web_noise::{init_logging, NoiseConfig};

/// Generate web traffic noise for privacy
#[derive(Parser, Debug)]
#[command(name = "web-noise", version, about)]
struct Args {
    /// Path to config JSON file
    #[arg(short, long)]
    config: PathBuf,

    /// Path to browser profiles JSON file (built-in profiles if omitted)
    #[arg(short, long)]
    profiles: Option<PathBuf>,

    /// Duration to run in seconds, 0 for unbounded (overrides config)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Number of concurrent simulated users
    #[arg(short, long, default_value_t = 1)]
    users: usize,

    /// Logging level
    #[arg(short, long, default_value = "info",
          value_parser = ["debug", "info", "warning", "error"])]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args.log);

    let mut config = NoiseConfig::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    if let Some(secs) = args.timeout {
        config.timeout = (secs > 0).then_some(secs);
    }

    let profiles = match &args.profiles {
        Some(path) => ProfilePool::load(path)
            .with_context(|| format!("failed to load profiles from {}", path.display()))?,
        None => {
            info!("No profiles file given, using built-in browser profiles");
            ProfilePool::builtin()
        }
    };

    let orchestrator = Orchestrator::new(
        Arc::new(config),
        Arc::new(profiles),
        OrchestratorConfig {
            users: args.users,
            ..Default::default()
        },
    );

    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, winding sessions down");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let report = orchestrator.run().await;

    info!(
        "Noise generation complete: {} page(s) fetched, {} error(s), {} session(s)",
        report.stats.total_success,
        report.stats.total_errors,
        report.outcomes.len()
    );

    Ok(())
}
