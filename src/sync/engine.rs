//! One sync pass: list both sides, match, create then delete

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ledger::PendingLedger;
use super::matcher;
use super::report::SyncRunReport;
use super::retry::RetryPolicy;
use crate::provider::{DestinationProvider, ProviderError, ProviderResult, SourceProvider};
use crate::task::{normalize_title, NewTask, Task, TaskId};

/// Knobs that change what a pass does, not how it talks to providers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOptions {
    /// List and match only; no create or delete calls
    pub dry_run: bool,
    /// Source tasks created before this instant are left alone
    pub created_after: Option<DateTime<Utc>>,
    /// Create destination tasks without a description
    pub skip_descriptions: bool,
    /// Applied to each create and delete call
    pub retry: RetryPolicy,
}

/// How a single source delete ended.
enum DeleteOutcome {
    Deleted,
    Pending,
    Abort,
}

/// Moves open tasks from a source provider to a destination provider.
///
/// The engine itself holds no state between passes. The only cross-pass
/// memory is the optional pending-deletion ledger.
pub struct SyncEngine {
    source: Arc<dyn SourceProvider>,
    destination: Arc<dyn DestinationProvider>,
    options: SyncOptions,
    ledger: Option<Arc<dyn PendingLedger>>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn SourceProvider>, destination: Arc<dyn DestinationProvider>) -> Self {
        Self {
            source,
            destination,
            options: SyncOptions::default(),
            ledger: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Remember failed source deletes and retry them on later passes
    pub fn with_pending_ledger(mut self, ledger: Arc<dyn PendingLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn source(&self) -> &dyn SourceProvider {
        self.source.as_ref()
    }

    pub fn destination(&self) -> &dyn DestinationProvider {
        self.destination.as_ref()
    }

    /// Run one complete pass.
    pub async fn run_once(&self) -> SyncRunReport {
        self.run_once_until(&CancellationToken::new()).await
    }

    /// Run one pass, stopping before the next task once `cancel` fires.
    ///
    /// Never returns an error: pass-level failures end up in
    /// [`SyncRunReport::aborted`], task-level ones in [`SyncRunReport::errors`].
    pub async fn run_once_until(&self, cancel: &CancellationToken) -> SyncRunReport {
        let mut report = SyncRunReport::new(self.options.dry_run);
        self.run_pass(cancel, &mut report).await;
        report.finish();

        if report.is_aborted() {
            error!("Sync pass aborted: {}", report.summary());
        } else if report.is_empty() {
            debug!("Sync pass finished: nothing to migrate");
        } else {
            info!("Sync pass finished: {}", report.summary());
        }
        report
    }

    async fn run_pass(&self, cancel: &CancellationToken, report: &mut SyncRunReport) {
        let source_tasks = match self.source.list_open_tasks().await {
            Ok(tasks) => open_only(tasks),
            Err(e) => {
                error!("Failed to list {} tasks: {}", self.source.name(), e);
                report.abort(&e);
                return;
            }
        };
        let destination_tasks = match self.destination.list_open_tasks().await {
            Ok(tasks) => open_only(tasks),
            Err(e) => {
                error!("Failed to list {} tasks: {}", self.destination.name(), e);
                report.abort(&e);
                return;
            }
        };
        debug!(
            "Listed {} source and {} destination tasks",
            source_tasks.len(),
            destination_tasks.len()
        );

        let plan = matcher::plan(&source_tasks, &destination_tasks);
        for task in &plan.untitled {
            warn!("Skipping source task {} with an empty title", task.id);
        }
        for task in &plan.shadowed {
            warn!(
                "Skipping source task {} ({:?}): another task with the same title is migrated first",
                task.id, task.title
            );
        }

        let mut pending = self.load_ledger();
        let mut still_pending = BTreeSet::new();

        // Retry deletes left over from earlier passes, in source order.
        if !pending.is_empty() {
            let retry_now: Vec<&Task> = plan
                .already_present
                .iter()
                .copied()
                .filter(|t| pending.contains(&t.id))
                .collect();
            let listed: HashSet<&TaskId> = source_tasks.iter().map(|t| &t.id).collect();
            let dropped = pending.iter().filter(|id| !listed.contains(id)).count();
            if dropped > 0 {
                debug!("Dropping {} pending deletion(s) no longer in the source", dropped);
            }

            for task in retry_now {
                pending.remove(&task.id);
                if cancel.is_cancelled() {
                    still_pending.insert(task.id.clone());
                    report.interrupted = true;
                    continue;
                }
                if report.is_aborted() {
                    still_pending.insert(task.id.clone());
                    continue;
                }
                if self.options.dry_run {
                    report.pending_deletion.push(task.id.clone());
                    still_pending.insert(task.id.clone());
                    continue;
                }
                info!("Retrying deletion of {} ({:?})", task.id, task.title);
                match self.delete_source(task, report).await {
                    DeleteOutcome::Deleted => {}
                    DeleteOutcome::Pending | DeleteOutcome::Abort => {
                        still_pending.insert(task.id.clone());
                    }
                }
            }
        }

        if !report.is_aborted() && !report.interrupted {
            for task in plan.to_migrate {
                if cancel.is_cancelled() {
                    info!("Cancellation requested, stopping before {:?}", task.title);
                    report.interrupted = true;
                    break;
                }
                if let Some(cutoff) = self.options.created_after {
                    if task.is_created_before(cutoff) {
                        debug!("Skipping {:?}: created before {}", task.title, cutoff);
                        continue;
                    }
                }

                match self.migrate(task, report).await {
                    Some(DeleteOutcome::Deleted) | None => {}
                    Some(DeleteOutcome::Pending) => {
                        still_pending.insert(task.id.clone());
                    }
                    Some(DeleteOutcome::Abort) => {
                        still_pending.insert(task.id.clone());
                        break;
                    }
                }
                if report.is_aborted() {
                    break;
                }
            }
        }

        self.store_ledger(&still_pending);
    }

    /// Create `task` in the destination, then remove it from the source.
    ///
    /// Returns `None` when nothing was created.
    async fn migrate(&self, task: &Task, report: &mut SyncRunReport) -> Option<DeleteOutcome> {
        let new_task = self.to_new_task(task);

        if self.options.dry_run {
            info!("Would create {:?} in {}", new_task.title, self.destination.name());
            report.created.push(task.title.clone());
            return None;
        }

        let destination = self.destination.as_ref();
        let payload = &new_task;
        let mut attempt = 0u32;
        let created = self
            .options
            .retry
            .run("create", move || {
                attempt += 1;
                let retrying = attempt > 1;
                async move {
                    // A failed create may still have been committed.
                    if retrying {
                        match find_by_title(destination, &payload.title).await {
                            Ok(Some(id)) => {
                                debug!(
                                    "{:?} already exists as {}, not creating again",
                                    payload.title, id
                                );
                                return Ok(id);
                            }
                            Ok(None) => {}
                            Err(e) => return Err(e),
                        }
                    }
                    destination.create_task(payload).await
                }
            })
            .await;

        match created {
            Ok(new_id) => {
                info!(
                    "Created {:?} in {} as {}",
                    task.title,
                    self.destination.name(),
                    new_id
                );
                report.created.push(task.title.clone());
            }
            Err(e) => {
                warn!("Failed to create {:?}: {}", task.title, e);
                if e.is_pass_fatal() {
                    report.abort(&e);
                } else {
                    report.record_error(task, &e);
                }
                return None;
            }
        }

        Some(self.delete_source(task, report).await)
    }

    async fn delete_source(&self, task: &Task, report: &mut SyncRunReport) -> DeleteOutcome {
        let source = self.source.as_ref();
        let id = &task.id;
        let deleted = self
            .options
            .retry
            .run("delete", move || source.delete_task(id))
            .await;

        match deleted {
            Ok(()) => {
                info!("Deleted {} from {}", task.id, self.source.name());
                report.deleted.push(task.id.clone());
                DeleteOutcome::Deleted
            }
            Err(ProviderError::NotFound(_)) => {
                warn!(
                    "Source task {} was already gone from {}",
                    task.id,
                    self.source.name()
                );
                report.deleted.push(task.id.clone());
                DeleteOutcome::Deleted
            }
            Err(e) => {
                warn!("Failed to delete {} from {}: {}", task.id, self.source.name(), e);
                report.pending_deletion.push(task.id.clone());
                if e.is_pass_fatal() {
                    report.abort(&e);
                    DeleteOutcome::Abort
                } else {
                    report.record_error(task, &e);
                    DeleteOutcome::Pending
                }
            }
        }
    }

    fn to_new_task(&self, task: &Task) -> NewTask {
        let from = self.source.priority_scale();
        let to = self.destination.priority_scale();
        let description = if self.options.skip_descriptions {
            None
        } else {
            task.description.clone().filter(|d| !d.trim().is_empty())
        };

        NewTask {
            title: task.title.trim().to_string(),
            description,
            due: task.due,
            priority: task.priority.map(|p| from.convert(p, to)),
        }
    }

    fn load_ledger(&self) -> BTreeSet<TaskId> {
        let Some(ledger) = &self.ledger else {
            return BTreeSet::new();
        };
        match ledger.load() {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Ignoring pending deletion ledger: {}", e);
                BTreeSet::new()
            }
        }
    }

    fn store_ledger(&self, pending: &BTreeSet<TaskId>) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(e) = ledger.store(pending) {
            warn!("Failed to save pending deletion ledger: {}", e);
        }
    }
}

/// Id of an open destination task whose normalized title equals `title`.
async fn find_by_title(
    destination: &dyn DestinationProvider,
    title: &str,
) -> ProviderResult<Option<TaskId>> {
    let key = normalize_title(title);
    let tasks = destination.list_open_tasks().await?;
    Ok(tasks
        .into_iter()
        .find(|t| !t.completed && t.normalized_title() == key)
        .map(|t| t.id))
}

fn open_only(tasks: Vec<Task>) -> Vec<Task> {
    tasks.into_iter().filter(|t| !t.completed).collect()
}
