//! CLI command implementations

pub mod auth;
pub mod definition;
pub mod init;
pub mod start;
pub mod status;
pub mod sync;

pub use definition::{Cli, Commands};

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::provider::google::ClientSecrets;
use crate::provider::{GoogleTasksClient, TodoistClient};
use crate::sync::{FileLedger, SyncEngine, SyncRunReport};

const TITLE_WIDTH: usize = 50;

pub fn google_client(config: &Config, app_dir: &Path) -> Result<GoogleTasksClient> {
    let credentials = config.require_google_credentials(app_dir)?;
    let secrets = ClientSecrets::from_file(&credentials)
        .with_context(|| format!("Failed to load {}", credentials.display()))?;
    let client = GoogleTasksClient::new(secrets, config.token_path(app_dir))?
        .with_tasklist(config.google.tasklist_id.clone());
    Ok(client)
}

pub fn todoist_client(config: &Config) -> Result<TodoistClient> {
    let client = TodoistClient::new(config.todoist_token()?)?
        .with_project(config.todoist.project_id.clone());
    Ok(client)
}

/// Wire providers and options from `config` into an engine.
pub fn build_engine(config: &Config, app_dir: &Path) -> Result<SyncEngine> {
    let source = google_client(config, app_dir)?;
    let destination = todoist_client(config)?;

    let mut engine = SyncEngine::new(Arc::new(source), Arc::new(destination))
        .with_options(config.sync_options()?);
    if config.sync.retry_pending_deletions {
        engine = engine.with_pending_ledger(Arc::new(FileLedger::in_dir(app_dir)));
    }
    Ok(engine)
}

/// Human-readable report, one item per line.
pub fn render_report(report: &SyncRunReport) -> String {
    let mut out = String::new();
    let verb = if report.dry_run { "Would create" } else { "Created" };

    for title in &report.created {
        out.push_str(&format!("  {}: {}\n", verb, truncate(title, TITLE_WIDTH)));
    }
    for id in &report.deleted {
        out.push_str(&format!("  Deleted from source: {}\n", id));
    }
    for id in &report.pending_deletion {
        out.push_str(&format!("  Pending deletion: {}\n", id));
    }
    for error in &report.errors {
        out.push_str(&format!(
            "  Error [{}] {}: {}\n",
            error.kind,
            truncate(&error.task.title, TITLE_WIDTH),
            error.message
        ));
    }

    if report.created.is_empty() && report.errors.is_empty() && report.aborted.is_none() {
        out.push_str("Nothing to sync.\n");
    }
    out.push_str(&format!("Summary: {}\n", report.summary()));
    out
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max <= 3 {
        s.chars().take(max).collect()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use crate::task::{Task, TaskId};

    #[test]
    fn test_truncate_shorter_than_max() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_longer_than_max() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_with_small_max() {
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("hello", 0), "");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("äöüäöüäöü", 5), "äö...");
    }

    #[test]
    fn test_render_empty_report() {
        let report = SyncRunReport::new(false);
        let text = render_report(&report);
        assert!(text.starts_with("Nothing to sync."));
        assert!(text.contains("Summary: created 0"));
    }

    #[test]
    fn test_render_lists_every_item() {
        let mut report = SyncRunReport::new(false);
        report.created.push("Buy milk".into());
        report.deleted.push(TaskId::from("g1"));
        report.pending_deletion.push(TaskId::from("g2"));
        report.record_error(
            &Task::new("g3", "Call Alice"),
            &ProviderError::Validation("bad due".into()),
        );

        let text = render_report(&report);
        assert!(text.contains("Created: Buy milk"));
        assert!(text.contains("Deleted from source: g1"));
        assert!(text.contains("Pending deletion: g2"));
        assert!(text.contains("Error [ValidationError] Call Alice: bad due"));
        assert!(!text.contains("Nothing to sync."));
    }

    #[test]
    fn test_render_dry_run_wording() {
        let mut report = SyncRunReport::new(true);
        report.created.push("Buy milk".into());
        assert!(render_report(&report).contains("Would create: Buy milk"));
    }

    #[test]
    fn test_build_engine_requires_credentials() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.todoist.api_token = Some("token".into());
        let err = build_engine(&config, dir.path()).err().unwrap();
        assert!(err.to_string().contains("Google credentials not found"));
    }
}
