pub mod events;
pub mod project;
pub mod walk;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::breadcrumbs::{read_breadcrumbs, ReadOutcome};
use crate::error::{Error, ErrorKind};

pub use events::{CancelToken, EventSender, ScanEvent, ScanHandle};
pub use walk::{start_scan, FolderScanner};

pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Deepest folder (root = 0) whose children are still inspected.
    pub max_depth: usize,
    pub include_hidden: bool,
    pub create_missing: bool,
    pub backup_originals: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            include_hidden: false,
            create_missing: false,
            backup_originals: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFolder {
    pub path: String,
    pub name: String,
    pub is_valid: bool,
    pub has_breadcrumbs: bool,
    pub invalid_breadcrumbs: bool,
    pub stale_breadcrumbs: bool,
    pub camera_count: u32,
    pub last_scanned: DateTime<Utc>,
    pub validation_errors: Vec<String>,
}

impl ProjectFolder {
    /// Anything the operator should look at: missing, unreadable or out-of-date breadcrumbs.
    pub fn needs_attention(&self) -> bool {
        !self.has_breadcrumbs || self.invalid_breadcrumbs || self.stale_breadcrumbs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanError {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ScanError {
    pub fn new(path: &Path, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub root_path: String,
    pub total_folders: usize,
    pub valid_projects: usize,
    pub created_breadcrumbs: usize,
    pub updated_breadcrumbs: usize,
    pub total_folder_size: u64,
    pub errors: Vec<ScanError>,
    pub projects: Vec<ProjectFolder>,
}

impl ScanResult {
    pub fn new(root: &Path) -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            root_path: root.to_string_lossy().into_owned(),
            total_folders: 0,
            valid_projects: 0,
            created_breadcrumbs: 0,
            updated_breadcrumbs: 0,
            total_folder_size: 0,
            errors: Vec::new(),
            projects: Vec::new(),
        }
    }

    pub fn project(&self, path: &str) -> Option<&ProjectFolder> {
        self.projects.iter().find(|p| p.path == path)
    }

    pub fn stale_projects(&self) -> impl Iterator<Item = &ProjectFolder> {
        self.projects.iter().filter(|p| p.stale_breadcrumbs)
    }
}

/// Everything the scanner learns about one folder.
#[derive(Debug)]
pub struct Inspection {
    /// Set when the folder qualifies as a project.
    pub project: Option<ProjectFolder>,
    pub partial: bool,
    pub folder_size: u64,
    pub errors: Vec<ScanError>,
}

/// Classify a single folder. A folder is listed when it has a valid skeleton or a
/// breadcrumbs file, parseable or not. A breadcrumbs file that cannot be read is only
/// reported as an error.
pub fn inspect_folder(path: &Path) -> Inspection {
    let structure = project::validate_structure(path);
    let outcome = read_breadcrumbs(path);
    let mut errors = Vec::new();

    let (has_breadcrumbs, invalid_breadcrumbs) = match &outcome {
        ReadOutcome::Absent => (false, false),
        ReadOutcome::Present(_) => (true, false),
        ReadOutcome::Corrupted {
            kind: ErrorKind::Corruption,
            reason,
        } => {
            errors.push(ScanError::new(path, ErrorKind::Corruption, reason.clone()));
            (false, true)
        }
        // Could not look inside the folder at all; that alone does not make it a project.
        ReadOutcome::Corrupted { kind, reason } => {
            errors.push(ScanError::new(path, *kind, reason.clone()));
            (false, false)
        }
    };

    if !(structure.is_valid || has_breadcrumbs || invalid_breadcrumbs) {
        return Inspection {
            project: None,
            partial: project::is_partial_project(path),
            folder_size: 0,
            errors,
        };
    }

    let (stale_breadcrumbs, folder_size) = match project::observe_project(path) {
        Ok(observed) => {
            let stale = outcome
                .record()
                .map(|record| project::is_stale(record, &observed))
                .unwrap_or(false);
            (stale, observed.folder_size)
        }
        Err(err) => {
            errors.push(ScanError::new(
                path,
                ErrorKind::from_io(&err),
                format!("Failed to inspect project contents: {}", err),
            ));
            (false, 0)
        }
    };

    let project = ProjectFolder {
        path: path.to_string_lossy().into_owned(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        is_valid: structure.is_valid,
        has_breadcrumbs,
        invalid_breadcrumbs,
        stale_breadcrumbs,
        camera_count: structure.camera_count,
        last_scanned: Utc::now(),
        validation_errors: structure.errors,
    };

    Inspection {
        project: Some(project),
        partial: false,
        folder_size,
        errors,
    }
}

/// Classify one folder without traversal.
pub fn validate_folder(path: &Path) -> Result<ProjectFolder, Error> {
    if !path.exists() {
        return Err(Error::Other(format!(
            "Folder does not exist: {}",
            path.display()
        )));
    }

    let inspection = inspect_folder(path);
    if let Some(project) = inspection.project {
        return Ok(project);
    }

    let structure = project::validate_structure(path);
    Ok(ProjectFolder {
        path: path.to_string_lossy().into_owned(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        is_valid: false,
        has_breadcrumbs: false,
        invalid_breadcrumbs: false,
        stale_breadcrumbs: false,
        camera_count: structure.camera_count,
        last_scanned: Utc::now(),
        validation_errors: structure.errors,
    })
}
