use chrono::Utc;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::events::{
    event_channel, CancelToken, EventSender, ProjectDiscovery, ScanEvent, ScanHandle, ScanProgress,
};
use super::project::is_hidden_name;
use super::{inspect_folder, Inspection, ScanError, ScanOptions, ScanResult};
use crate::error::{Error, ErrorKind};

const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Walks a directory tree looking for project folders.
///
/// Traversal is sequential. The cancel token is checked before each directory, so a
/// cancel takes effect after at most one folder's worth of I/O.
pub struct FolderScanner {
    options: ScanOptions,
    ignore_patterns: Vec<Pattern>,
    cancel: CancelToken,
}

impl FolderScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            ignore_patterns: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Glob patterns matched against directory names. Invalid patterns are logged and skipped.
    pub fn with_ignore_patterns(mut self, globs: &[String]) -> Self {
        self.ignore_patterns = globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|p| p.matches(name))
    }

    /// Scan `root`. Per-folder failures end up in `ScanResult::errors`; only an
    /// unusable root, invalid options or cancellation return `Err`.
    ///
    /// Exactly one terminal event (completed, failed or cancelled) is sent.
    pub fn scan(&self, root: &Path, events: &EventSender) -> Result<ScanResult, Error> {
        info!(
            "Starting scan {}: path={}, max_depth={}, include_hidden={}",
            events.scan_id(),
            root.display(),
            self.options.max_depth,
            self.options.include_hidden
        );
        let started = Instant::now();

        if let Err(err) = self.check_preconditions(root) {
            error!("Scan {} rejected: {}", events.scan_id(), err);
            events.send(ScanEvent::Failed {
                scan_id: events.scan_id().to_string(),
                error: ScanError::new(root, err.kind(), err.to_string()),
            });
            return Err(err);
        }

        match self.walk(root, events) {
            Ok(result) => {
                info!(
                    "Scan {} completed in {:.2}s: {} projects ({} valid), {} folders scanned, {} errors",
                    events.scan_id(),
                    started.elapsed().as_secs_f64(),
                    result.projects.len(),
                    result.valid_projects,
                    result.total_folders,
                    result.errors.len()
                );
                events.send(ScanEvent::Completed {
                    scan_id: events.scan_id().to_string(),
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(Error::Cancelled) => {
                warn!(
                    "Scan {} cancelled after {:.2}s",
                    events.scan_id(),
                    started.elapsed().as_secs_f64()
                );
                events.send(ScanEvent::Cancelled {
                    scan_id: events.scan_id().to_string(),
                });
                Err(Error::Cancelled)
            }
            Err(err) => {
                error!("Scan {} failed: {}", events.scan_id(), err);
                events.send(ScanEvent::Failed {
                    scan_id: events.scan_id().to_string(),
                    error: ScanError::new(root, ErrorKind::Filesystem, err.to_string()),
                });
                Err(err)
            }
        }
    }

    fn check_preconditions(&self, root: &Path) -> Result<(), Error> {
        if self.options.max_depth < 1 {
            return Err(Error::InvalidOptions(
                "Max depth must be at least 1".to_string(),
            ));
        }
        if !root.exists() {
            return Err(Error::RootPath {
                path: root.display().to_string(),
                reason: "does not exist".to_string(),
            });
        }
        if !root.is_dir() {
            return Err(Error::RootPath {
                path: root.display().to_string(),
                reason: "is not a directory".to_string(),
            });
        }
        fs::read_dir(root)?;
        Ok(())
    }

    fn walk(&self, root: &Path, events: &EventSender) -> Result<ScanResult, Error> {
        let mut result = ScanResult::new(root);
        let mut last_progress: Option<Instant> = None;

        // The root itself may be a project; if so there is nothing below it to find.
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let root_inspection = inspect_folder(root);
        let root_is_project = root_inspection.project.is_some();
        self.record(root_inspection, &mut result, events);
        if root_is_project {
            result.end_time = Some(Utc::now());
            return Ok(result);
        }

        // Folders down to `max_depth` are opened, so their children are still inspected.
        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(self.options.max_depth + 1)
            .sort_by_file_name()
            .into_iter();

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.to_path_buf());
                    let kind = err
                        .io_error()
                        .map(ErrorKind::from_io)
                        .unwrap_or(ErrorKind::Filesystem);
                    warn!("Cannot read {}: {}", path.display(), err);
                    result.errors.push(ScanError::new(&path, kind, err.to_string()));
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if (!self.options.include_hidden && is_hidden_name(&name)) || self.is_ignored(&name) {
                walker.skip_current_dir();
                continue;
            }

            result.total_folders += 1;
            let path = entry.path();

            if last_progress.map_or(true, |t| t.elapsed() >= PROGRESS_UPDATE_INTERVAL) {
                events.progress(ScanProgress {
                    scan_id: events.scan_id().to_string(),
                    folders_scanned: result.total_folders,
                    total_folders: result.total_folders,
                    current_path: path.to_string_lossy().into_owned(),
                    projects_found: result.projects.len(),
                });
                last_progress = Some(Instant::now());
            }

            let inspection = inspect_folder(path);
            let stop_descent = inspection.project.is_some() || inspection.partial;
            self.record(inspection, &mut result, events);
            if stop_descent {
                walker.skip_current_dir();
            }
        }

        result.end_time = Some(Utc::now());
        Ok(result)
    }

    fn record(&self, inspection: Inspection, result: &mut ScanResult, events: &EventSender) {
        result.errors.extend(inspection.errors);

        let Some(project) = inspection.project else {
            return;
        };

        debug!(
            "Project: {} | valid: {} | breadcrumbs: {} | invalid: {} | stale: {} | cameras: {}",
            project.path,
            project.is_valid,
            project.has_breadcrumbs,
            project.invalid_breadcrumbs,
            project.stale_breadcrumbs,
            project.camera_count
        );

        if project.is_valid {
            result.valid_projects += 1;
        }
        result.total_folder_size += inspection.folder_size;

        events.send(ScanEvent::Discovered(ProjectDiscovery {
            scan_id: events.scan_id().to_string(),
            project_path: project.path.clone(),
            is_valid: project.is_valid,
            has_breadcrumbs: project.has_breadcrumbs,
            invalid_breadcrumbs: project.invalid_breadcrumbs,
            stale_breadcrumbs: project.stale_breadcrumbs,
            errors: project.validation_errors.clone(),
        }));
        result.projects.push(project);
    }
}

/// Run a scan on a background thread and hand back its event stream.
pub fn start_scan(
    root: PathBuf,
    options: ScanOptions,
    ignore_patterns: &[String],
) -> ScanHandle {
    let scan_id = Uuid::new_v4().to_string();
    let (sender, receiver) = event_channel(&scan_id);
    let scanner = FolderScanner::new(options).with_ignore_patterns(ignore_patterns);
    let cancel = scanner.cancel_token();

    debug!("Spawning scan thread for {}", scan_id);
    let thread = thread::spawn(move || scanner.scan(&root, &sender));

    ScanHandle::new(scan_id, cancel, receiver, thread)
}
