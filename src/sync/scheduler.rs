//! Fixed-interval pass loop

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::SyncEngine;
use super::report::SyncRunReport;

/// Runs [`SyncEngine`] passes back to back with a sleep in between.
///
/// Passes never overlap. Only cancellation ends the loop; an aborted pass is
/// logged and the next one runs after the usual interval.
pub struct Scheduler {
    engine: SyncEngine,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: SyncEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Loop until `cancel` fires. Returns the number of passes that ran.
    ///
    /// `on_pass` sees every report with its 1-based pass number.
    pub async fn run<F>(&self, cancel: CancellationToken, mut on_pass: F) -> u64
    where
        F: FnMut(u64, &SyncRunReport),
    {
        let mut passes = 0u64;
        info!("Scheduler started, syncing every {:?}", self.interval);

        while !cancel.is_cancelled() {
            let report = self.engine.run_once_until(&cancel).await;
            passes += 1;

            if let Some(abort) = &report.aborted {
                warn!("Pass {} aborted ({}); retrying in {:?}", passes, abort, self.interval);
            } else {
                debug!("Pass {} complete: {}", passes, report.summary());
            }
            on_pass(passes, &report);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Scheduler stopped after {} pass(es)", passes);
        passes
    }
}
