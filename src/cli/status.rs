//! `tasksync status` command implementation

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::Path;

use crate::config::{config_path, Config};
use crate::provider::{DestinationProvider, SourceProvider};

#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ProviderStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    open_tasks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProviderStatus {
    fn from_listing<E: std::fmt::Display>(result: std::result::Result<usize, E>) -> Self {
        match result {
            Ok(count) => Self {
                ok: true,
                open_tasks: Some(count),
                error: None,
            },
            Err(e) => Self {
                ok: false,
                open_tasks: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn describe(&self) -> String {
        match (&self.open_tasks, &self.error) {
            (Some(count), _) => format!("ok ({} open tasks)", count),
            (None, Some(error)) => format!("unavailable: {}", error),
            (None, None) => "unavailable".to_string(),
        }
    }
}

#[derive(Serialize)]
struct StatusJson {
    app_dir: String,
    config_file: String,
    config_exists: bool,
    interval_secs: u64,
    dry_run: bool,
    retry_pending_deletions: bool,
    google: ProviderStatus,
    todoist: ProviderStatus,
}

async fn google_status(config: &Config, app_dir: &Path) -> ProviderStatus {
    let client = match super::google_client(config, app_dir) {
        Ok(client) => client,
        Err(e) => return ProviderStatus::from_listing::<anyhow::Error>(Err(e)),
    };
    ProviderStatus::from_listing(client.list_open_tasks().await.map(|t| t.len()))
}

async fn todoist_status(config: &Config) -> ProviderStatus {
    let client = match super::todoist_client(config) {
        Ok(client) => client,
        Err(e) => return ProviderStatus::from_listing::<anyhow::Error>(Err(e)),
    };
    ProviderStatus::from_listing(client.list_open_tasks().await.map(|t| t.len()))
}

pub async fn run(config: &Config, app_dir: &Path, args: StatusArgs) -> Result<()> {
    let config_file = config_path(app_dir);
    let status = StatusJson {
        app_dir: app_dir.display().to_string(),
        config_file: config_file.display().to_string(),
        config_exists: config_file.exists(),
        interval_secs: config.sync.interval_secs,
        dry_run: config.sync.dry_run,
        retry_pending_deletions: config.sync.retry_pending_deletions,
        google: google_status(config, app_dir).await,
        todoist: todoist_status(config).await,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("App directory:  {}", status.app_dir);
    println!(
        "Config file:    {}{}",
        status.config_file,
        if status.config_exists { "" } else { " (not found, using defaults)" }
    );
    println!("Interval:       {}s", status.interval_secs);
    println!("Dry run:        {}", status.dry_run);
    println!("Retry deletes:  {}", status.retry_pending_deletions);
    println!();
    println!("Google Tasks:   {}", status.google.describe());
    println!("Todoist:        {}", status.todoist.describe());

    Ok(())
}
