pub mod apply;
pub mod breadcrumbs;
pub mod config;
pub mod diff;
pub mod error;
pub mod preview;
pub mod progress;
pub mod propagate;
pub mod reconcile;
pub mod scanner;

pub use apply::{BatchApplier, BatchOptions, BatchUpdateResult, FailedUpdate, ItemOutcome};
pub use breadcrumbs::{read_breadcrumbs, BreadcrumbsFile, FileInfo, ReadOutcome};
pub use config::AppConfig;
pub use diff::{compare, BreadcrumbsDiff, ChangeRecord, DiffMode, ProjectDiff};
pub use error::{Error, ErrorKind};
pub use preview::{aggregate, has_any_changes, prepare_preview, BatchPreview, PreviewSummary};
pub use progress::{ProgressReporter, SilentReporter};
pub use propagate::{CardClient, ExternalPropagator, SyncFailure};
pub use scanner::{
    start_scan, validate_folder, CancelToken, FolderScanner, ProjectFolder, ScanError, ScanEvent,
    ScanHandle, ScanOptions, ScanResult,
};
