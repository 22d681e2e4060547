use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use breadcrumbs_baker::apply::{BatchUpdateResult, ItemOutcome};
use breadcrumbs_baker::propagate::SyncFailure;
use breadcrumbs_baker::{Error, ProgressReporter, ScanEvent, ScanHandle, ScanResult};

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const MAX_PATH_DISPLAY: usize = 60;

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(TICK_CHARS);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Shorten a long path to `head...tail`.
pub fn compress_path(path: &str, max_chars: usize) -> String {
    let chars: Vec<char> = path.chars().collect();
    if chars.len() <= max_chars || max_chars < 5 {
        return path.to_string();
    }
    let head = (max_chars - 3) / 2;
    let tail = max_chars - 3 - head;
    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{}...{}", start, end)
}

/// Drain a running scan's events into a spinner, then collect its result.
pub fn follow_scan(handle: ScanHandle) -> Result<ScanResult, Error> {
    let pb = spinner("Scanning...");

    for event in handle.events() {
        match event {
            ScanEvent::Progress(progress) => pb.set_message(format!(
                "Scanning... {} folders, {} projects  {}",
                progress.folders_scanned,
                progress.projects_found,
                compress_path(&progress.current_path, MAX_PATH_DISPLAY)
            )),
            ScanEvent::Discovered(found) => {
                if found.invalid_breadcrumbs {
                    pb.println(format!(
                        "  \x1b[31m!\x1b[0m {} has unreadable breadcrumbs",
                        found.project_path
                    ));
                }
            }
            ScanEvent::Completed { result, .. } => {
                pb.finish_and_clear();
                eprintln!(
                    "  \x1b[32m✓\x1b[0m Scan complete: {} projects in {} folders",
                    result.projects.len(),
                    result.total_folders
                );
            }
            ScanEvent::Failed { error, .. } => {
                pb.finish_and_clear();
                eprintln!("  \x1b[31m✗\x1b[0m Scan failed: {}", error.message);
            }
            ScanEvent::Cancelled { .. } => {
                pb.finish_and_clear();
                eprintln!("  \x1b[33m-\x1b[0m Scan cancelled");
            }
        }
    }

    pb.finish_and_clear();
    handle.join()
}

/// CLI progress reporter for batch apply and card sync.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_apply_start(&self, total_projects: usize) {
        let pb = ProgressBar::new(total_projects as u64);
        let style = ProgressStyle::with_template(
            "  {spinner:.cyan} Writing [{bar:30.cyan/dim}] {pos}/{len} projects",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_apply_progress(&self, completed: usize, _total: usize, path: &str, outcome: &ItemOutcome) {
        self.with_bar(|pb| {
            pb.set_position(completed as u64);
            if let ItemOutcome::Failed(failure) = outcome {
                pb.println(format!("  \x1b[31m✗\x1b[0m {}: {}", path, failure.error));
            }
        });
    }

    fn on_apply_complete(&self, result: &BatchUpdateResult, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Apply complete: {} written, {} failed in {:.2}s",
            result.successful.len(),
            result.failed.len(),
            duration_secs
        );
    }

    fn on_sync_start(&self, total_projects: usize) {
        self.set_bar(spinner(&format!("Syncing cards for {} projects...", total_projects)));
    }

    fn on_sync_project(&self, project: &str, cards: usize, failures: usize) {
        self.with_bar(|pb| {
            pb.set_message(format!(
                "Synced {} ({} cards, {} failed)",
                compress_path(project, MAX_PATH_DISPLAY),
                cards,
                failures
            ))
        });
    }

    fn on_sync_complete(&self, failures: &[SyncFailure], duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Card sync complete: {} failures in {:.2}s",
            failures.len(),
            duration_secs
        );
    }
}
