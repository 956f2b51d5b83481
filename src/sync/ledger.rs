//! Record of source tasks that were copied but could not be deleted
//!
//! Off by default. When enabled, a failed source delete is remembered across
//! passes so the deletion can be retried once the copy is confirmed to still
//! exist in the destination.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::task::TaskId;

pub const LEDGER_FILE: &str = "pending_deletions.json";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("failed to read or write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt ledger {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage for the set of source ids awaiting deletion.
pub trait PendingLedger: Send + Sync {
    fn load(&self) -> Result<BTreeSet<TaskId>, LedgerError>;
    fn store(&self, pending: &BTreeSet<TaskId>) -> Result<(), LedgerError>;
}

/// Ledger kept as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger file inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(LEDGER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PendingLedger for FileLedger {
    fn load(&self) -> Result<BTreeSet<TaskId>, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, pending: &BTreeSet<TaskId>) -> Result<(), LedgerError> {
        if pending.is_empty() && !self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let content = serde_json::to_string_pretty(pending).map_err(|source| {
            LedgerError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, content).map_err(|e| self.io_error(e))?;
        debug!("Saved {} pending deletion(s) to {}", pending.len(), self.path.display());
        Ok(())
    }
}

/// Process-local ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    pending: Mutex<BTreeSet<TaskId>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeSet<TaskId> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PendingLedger for MemoryLedger {
    fn load(&self) -> Result<BTreeSet<TaskId>, LedgerError> {
        Ok(self.snapshot())
    }

    fn store(&self, pending: &BTreeSet<TaskId>) -> Result<(), LedgerError> {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = pending.clone();
        Ok(())
    }
}
