//! Per-pass run report

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::provider::{ErrorKind, ProviderError};
use crate::task::{Task, TaskId};

/// Reference to the task an error entry is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRef {
    pub id: TaskId,
    pub title: String,
}

impl From<&Task> for TaskRef {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
        }
    }
}

/// A task-local failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    pub task: TaskRef,
    pub kind: ErrorKind,
    pub message: String,
}

/// Why a pass stopped before processing every task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassAbort {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for PassAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Everything one pass did, in processing order.
///
/// Created fresh for each pass; nothing in it survives into the next pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncRunReport {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Titles created in the destination (or that would be, in a dry run)
    pub created: Vec<String>,
    /// Source identifiers removed after their destination copy was created
    pub deleted: Vec<TaskId>,
    /// Source identifiers created in the destination but still in the source
    pub pending_deletion: Vec<TaskId>,
    pub errors: Vec<TaskError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<PassAbort>,
    /// Stopped early because cancellation was requested
    pub interrupted: bool,
    pub dry_run: bool,
}

impl SyncRunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            created: Vec::new(),
            deleted: Vec::new(),
            pending_deletion: Vec::new(),
            errors: Vec::new(),
            aborted: None,
            interrupted: false,
            dry_run,
        }
    }

    pub fn record_error(&mut self, task: &Task, error: &ProviderError) {
        self.errors.push(TaskError {
            task: TaskRef::from(task),
            kind: error.kind(),
            message: error.message().to_string(),
        });
    }

    pub fn abort(&mut self, error: &ProviderError) {
        self.aborted = Some(PassAbort {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// No abort and no task-level errors
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.errors.is_empty()
    }

    /// Nothing happened and nothing went wrong
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.deleted.is_empty()
            && self.pending_deletion.is_empty()
            && self.errors.is_empty()
            && self.aborted.is_none()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let mut line = format!(
            "created {}, deleted {}, pending deletion {}, errors {}",
            self.created.len(),
            self.deleted.len(),
            self.pending_deletion.len(),
            self.errors.len()
        );
        if self.dry_run {
            line.push_str(" (dry run)");
        }
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        if let Some(abort) = &self.aborted {
            line.push_str(&format!("; aborted: {}", abort));
        }
        line
    }
}
