//! Batch writer for reconciled breadcrumbs.
//!
//! Every selected project is handled on its own: read, optional backup, write. One
//! project's failure is recorded and never touches another project's outcome.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::breadcrumbs::reader::{backup_breadcrumbs, write_breadcrumbs};
use crate::breadcrumbs::{read_breadcrumbs, ReadOutcome};
use crate::config::{AppConfig, DEFAULT_APPLY_CONCURRENCY};
use crate::error::{Error, ErrorKind};
use crate::progress::ProgressReporter;
use crate::reconcile::build_target;
use crate::scanner::project::{observe_project, validate_structure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub create_missing: bool,
    pub backup_originals: bool,
    /// Upper bound on projects written at the same time.
    pub max_concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            create_missing: false,
            backup_originals: true,
            max_concurrency: DEFAULT_APPLY_CONCURRENCY,
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            create_missing: config.scan.create_missing,
            backup_originals: config.scan.backup_originals,
            max_concurrency: config.apply_concurrency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpdate {
    pub path: String,
    pub error: String,
    pub kind: ErrorKind,
}

impl FailedUpdate {
    fn new(path: &str, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            error: error.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Created,
    Updated,
    /// No breadcrumbs file and creation was not requested.
    Skipped,
    Failed(FailedUpdate),
}

/// `successful` holds exactly the `created` and `updated` paths. All lists keep input order.
/// Every deduplicated input path lands in exactly one of successful, failed or skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchUpdateResult {
    pub successful: Vec<String>,
    pub failed: Vec<FailedUpdate>,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
}

impl BatchUpdateResult {
    fn record(&mut self, path: String, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Created => {
                self.successful.push(path.clone());
                self.created.push(path);
            }
            ItemOutcome::Updated => {
                self.successful.push(path.clone());
                self.updated.push(path);
            }
            ItemOutcome::Skipped => self.skipped.push(path),
            ItemOutcome::Failed(failure) => self.failed.push(failure),
        }
    }

    /// Paths whose breadcrumbs file was written by this batch.
    pub fn written(&self) -> impl Iterator<Item = &String> {
        self.successful.iter()
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len() + self.skipped.len()
    }
}

pub struct BatchApplier {
    options: BatchOptions,
}

impl BatchApplier {
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn apply<P: AsRef<Path>>(
        &self,
        paths: &[P],
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchUpdateResult, Error> {
        self.apply_at(paths, Utc::now(), reporter)
    }

    /// Apply with an explicit timestamp for `lastModified` and new records.
    ///
    /// Fails only on an empty selection. Duplicate paths are written once.
    pub fn apply_at<P: AsRef<Path>>(
        &self,
        paths: &[P],
        now: DateTime<Utc>,
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchUpdateResult, Error> {
        if paths.is_empty() {
            return Err(Error::EmptySelection);
        }

        let mut seen = HashSet::new();
        let selected: Vec<String> = paths
            .iter()
            .map(|p| p.as_ref().to_string_lossy().into_owned())
            .filter(|p| seen.insert(p.clone()))
            .collect();
        let total = selected.len();

        info!(
            "Applying breadcrumbs to {} projects (create_missing={}, backup_originals={}, concurrency={})",
            total,
            self.options.create_missing,
            self.options.backup_originals,
            self.options.max_concurrency
        );
        reporter.on_apply_start(total);
        let started = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.max_concurrency.max(1))
            .build()
            .map_err(|e| Error::Other(format!("Failed to build apply thread pool: {}", e)))?;

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<ItemOutcome> = pool.install(|| {
            selected
                .par_iter()
                .map(|path| {
                    let outcome = apply_one(Path::new(path), &self.options, now);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    reporter.on_apply_progress(done, total, path, &outcome);
                    outcome
                })
                .collect()
        });

        let mut result = BatchUpdateResult::default();
        for (path, outcome) in selected.into_iter().zip(outcomes) {
            result.record(path, outcome);
        }

        let duration = started.elapsed().as_secs_f64();
        info!(
            "Batch apply finished in {:.2}s: {} created, {} updated, {} skipped, {} failed",
            duration,
            result.created.len(),
            result.updated.len(),
            result.skipped.len(),
            result.failed.len()
        );
        reporter.on_apply_complete(&result, duration);
        Ok(result)
    }
}

/// Read, optionally back up, and write one project.
pub fn apply_one(path: &Path, options: &BatchOptions, now: DateTime<Utc>) -> ItemOutcome {
    let shown = path.to_string_lossy();

    if !path.exists() {
        warn!("Skipping {}: path does not exist", shown);
        return ItemOutcome::Failed(FailedUpdate::new(
            &shown,
            ErrorKind::Filesystem,
            "Path does not exist",
        ));
    }

    let (had_file, existing) = match read_breadcrumbs(path) {
        ReadOutcome::Absent if !options.create_missing => {
            debug!("No breadcrumbs in {} and create_missing is off", shown);
            return ItemOutcome::Skipped;
        }
        ReadOutcome::Absent => (false, None),
        ReadOutcome::Present(record) => (true, Some(record)),
        ReadOutcome::Corrupted {
            kind: ErrorKind::Corruption,
            reason,
        } => {
            debug!("Replacing corrupted breadcrumbs in {}: {}", shown, reason);
            (true, None)
        }
        ReadOutcome::Corrupted { kind, reason } => {
            warn!("Cannot read breadcrumbs in {}: {}", shown, reason);
            return ItemOutcome::Failed(FailedUpdate::new(&shown, kind, reason));
        }
    };

    let structure = validate_structure(path);
    if !structure.is_valid {
        return ItemOutcome::Failed(FailedUpdate::new(
            &shown,
            ErrorKind::Structure,
            format!("Invalid project structure: {}", structure.errors.join("; ")),
        ));
    }

    let observed = match observe_project(path) {
        Ok(observed) => observed,
        Err(err) => {
            warn!("Cannot observe {}: {}", shown, err);
            return ItemOutcome::Failed(FailedUpdate::new(
                &shown,
                ErrorKind::from_io(&err),
                format!("Failed to read project contents: {}", err),
            ));
        }
    };
    let target = build_target(path, existing.as_ref(), &observed, now);

    if had_file && options.backup_originals {
        if let Err(err) = backup_breadcrumbs(path) {
            warn!("Backup failed for {}: {}", shown, err);
            return ItemOutcome::Failed(FailedUpdate::new(
                &shown,
                ErrorKind::from_io(&err),
                format!("Failed to create backup: {}", err),
            ));
        }
    }

    if let Err(err) = write_breadcrumbs(path, &target) {
        warn!("Write failed for {}: {}", shown, err);
        return ItemOutcome::Failed(FailedUpdate::new(
            &shown,
            err.kind(),
            format!("Failed to write breadcrumbs file: {}", err),
        ));
    }

    if had_file {
        debug!("Updated breadcrumbs in {}", shown);
        ItemOutcome::Updated
    } else {
        debug!("Created breadcrumbs in {}", shown);
        ItemOutcome::Created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breadcrumbs::reader::backup_path;
    use crate::progress::SilentReporter;
    use crate::scanner::project::REQUIRED_SUBFOLDERS;
    use std::fs;
    use tempfile::tempdir;

    fn make_project(root: &Path, name: &str) -> String {
        let project = root.join(name);
        for folder in REQUIRED_SUBFOLDERS {
            fs::create_dir_all(project.join(folder)).unwrap();
        }
        fs::create_dir_all(project.join("Footage/Camera 1")).unwrap();
        fs::write(project.join("Footage/Camera 1/a.mp4"), b"clip").unwrap();
        project.to_string_lossy().into_owned()
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let applier = BatchApplier::new(BatchOptions::default());
        let paths: Vec<String> = Vec::new();
        assert!(matches!(
            applier.apply(&paths, &SilentReporter),
            Err(Error::EmptySelection)
        ));
    }

    #[test]
    fn test_absent_without_create_is_noop() {
        let dir = tempdir().unwrap();
        let project = make_project(dir.path(), "P");
        let applier = BatchApplier::new(BatchOptions::default());

        let result = applier.apply(&[project.clone()], &SilentReporter).unwrap();
        assert!(result.created.is_empty());
        assert!(result.updated.is_empty());
        assert!(result.failed.is_empty());
        assert_eq!(result.skipped, vec![project.clone()]);
        assert!(!Path::new(&project).join("breadcrumbs.json").exists());
    }

    #[test]
    fn test_corrupted_file_is_backed_up_and_replaced() {
        let dir = tempdir().unwrap();
        let project = make_project(dir.path(), "P");
        fs::write(Path::new(&project).join("breadcrumbs.json"), "{ nope").unwrap();

        let outcome = apply_one(Path::new(&project), &BatchOptions::default(), Utc::now());
        assert_eq!(outcome, ItemOutcome::Updated);
        assert_eq!(
            fs::read_to_string(backup_path(Path::new(&project))).unwrap(),
            "{ nope"
        );
        assert!(read_breadcrumbs(Path::new(&project)).is_present());
    }

    #[test]
    fn test_invalid_structure_fails_with_structure_kind() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("loose");
        fs::create_dir_all(&project).unwrap();
        let options = BatchOptions {
            create_missing: true,
            ..Default::default()
        };

        match apply_one(&project, &options, Utc::now()) {
            ItemOutcome::Failed(failure) => {
                assert_eq!(failure.kind, ErrorKind::Structure);
                assert!(failure.error.contains("Missing required subfolder: Footage"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!project.join("breadcrumbs.json").exists());
    }

    #[test]
    fn test_duplicates_are_written_once() {
        let dir = tempdir().unwrap();
        let project = make_project(dir.path(), "P");
        let options = BatchOptions {
            create_missing: true,
            ..Default::default()
        };
        let result = BatchApplier::new(options)
            .apply(&[project.clone(), project.clone()], &SilentReporter)
            .unwrap();
        assert_eq!(result.created, vec![project.clone()]);
        assert_eq!(result.successful, vec![project]);
        assert_eq!(result.total(), 1);
    }
}
