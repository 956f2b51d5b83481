//! `tasksync start` command implementation

use anyhow::{bail, Result};
use clap::Args;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, MIN_INTERVAL_SECS};
use crate::sync::Scheduler;

#[derive(Args)]
pub struct StartArgs {
    /// Seconds between passes (overrides the config file)
    #[arg(long)]
    pub interval: Option<u64>,
}

pub async fn run(config: &Config, app_dir: &Path, args: StartArgs) -> Result<()> {
    let interval = match args.interval {
        Some(secs) if secs < MIN_INTERVAL_SECS => bail!(
            "Interval of {}s is below the minimum of {}s",
            secs,
            MIN_INTERVAL_SECS
        ),
        Some(secs) => Duration::from_secs(secs),
        None => config.interval(),
    };

    let engine = super::build_engine(config, app_dir)?;
    let scheduler = Scheduler::new(engine, interval);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, finishing up");
                on_signal.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let engine = scheduler.engine();
    println!(
        "Syncing {} -> {} every {}s{}. Press Ctrl-C to stop.",
        engine.source().name(),
        engine.destination().name(),
        scheduler.interval().as_secs(),
        if engine.options().dry_run { " (dry run)" } else { "" }
    );

    let passes = scheduler
        .run(cancel, |pass, report| {
            info!("Pass {}: {}", pass, report.summary());
            println!("[pass {}] {}", pass, report.summary());
        })
        .await;

    println!("Stopped after {} pass(es).", passes);
    Ok(())
}
