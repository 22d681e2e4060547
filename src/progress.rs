use crate::apply::{BatchUpdateResult, ItemOutcome};
use crate::propagate::SyncFailure;

/// Trait for reporting batch apply and card sync progress.
///
/// Scan progress travels over the scan event channel instead; see `scanner::events`.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_apply_start(&self, _total_projects: usize) {}
    fn on_apply_progress(&self, _completed: usize, _total: usize, _path: &str, _outcome: &ItemOutcome) {}
    fn on_apply_complete(&self, _result: &BatchUpdateResult, _duration_secs: f64) {}
    fn on_sync_start(&self, _total_projects: usize) {}
    fn on_sync_project(&self, _project: &str, _cards: usize, _failures: usize) {}
    fn on_sync_complete(&self, _failures: &[SyncFailure], _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
