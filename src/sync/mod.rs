//! Sync orchestration
//!
//! A pass lists both providers once, matches by normalized title and, for
//! every unmatched source task in source order, creates the destination copy
//! before deleting the source task. The [`Scheduler`] repeats passes at a fixed
//! interval.

pub mod engine;
pub mod ledger;
pub mod matcher;
pub mod report;
pub mod retry;
pub mod scheduler;

pub use engine::{SyncEngine, SyncOptions};
pub use ledger::{FileLedger, LedgerError, MemoryLedger, PendingLedger, LEDGER_FILE};
pub use matcher::{plan, tasks_to_migrate, MatchPlan};
pub use report::{PassAbort, SyncRunReport, TaskError, TaskRef};
pub use retry::RetryPolicy;
pub use scheduler::Scheduler;
