//! `tasksync sync` command implementation

use anyhow::{bail, Result};
use clap::Args;
use std::path::Path;

use crate::config::Config;

#[derive(Args)]
pub struct SyncArgs {
    /// List and match only; create and delete nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(config: &Config, app_dir: &Path, args: SyncArgs) -> Result<()> {
    let mut config = config.clone();
    if args.dry_run {
        config.sync.dry_run = true;
    }

    let engine = super::build_engine(&config, app_dir)?;
    let report = engine.run_once().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", super::render_report(&report));
    }

    if let Some(abort) = &report.aborted {
        bail!("Sync pass aborted: {}", abort);
    }
    Ok(())
}
