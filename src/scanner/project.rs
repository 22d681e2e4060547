//! What the filesystem says about one project folder: skeleton validation, the
//! footage manifest, folder size and newest file mtime.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::breadcrumbs::{BreadcrumbsFile, FileInfo, BACKUP_FILE_NAME, BREADCRUMBS_FILE_NAME};
use crate::error::Error;

pub const REQUIRED_SUBFOLDERS: &[&str] = &["Footage", "Graphics", "Renders", "Projects", "Scripts"];
pub const FOOTAGE_DIR: &str = "Footage";
pub const GRAPHICS_DIR: &str = "Graphics";
const CAMERA_PREFIX: &str = "Camera ";

/// Minimum folder size drift before a recorded size counts as out of date.
pub const STALE_SIZE_THRESHOLD_BYTES: u64 = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureCheck {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub camera_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectObservation {
    pub camera_count: u32,
    pub files: Vec<FileInfo>,
    pub folder_size: u64,
    pub newest_mtime: Option<DateTime<Utc>>,
}

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Parse `Camera <n>` into `n`. Camera numbers start at 1.
pub fn camera_number(dir_name: &str) -> Option<u32> {
    dir_name
        .strip_prefix(CAMERA_PREFIX)
        .and_then(|n| n.trim().parse::<u32>().ok())
        .filter(|n| *n >= 1)
}

fn camera_dirs(project: &Path) -> io::Result<Vec<(u32, String)>> {
    let mut cameras = Vec::new();
    for entry in fs::read_dir(project.join(FOOTAGE_DIR))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(camera) = camera_number(&name) {
            if entry.path().is_dir() {
                cameras.push((camera, name));
            }
        }
    }
    cameras.sort();
    Ok(cameras)
}

pub fn validate_structure(project: &Path) -> StructureCheck {
    let mut errors = Vec::new();

    if !project.is_dir() {
        errors.push("Folder does not exist".to_string());
        return StructureCheck {
            is_valid: false,
            errors,
            camera_count: 0,
        };
    }

    for folder in REQUIRED_SUBFOLDERS {
        if !project.join(folder).is_dir() {
            errors.push(format!("Missing required subfolder: {}", folder));
        }
    }

    let camera_count = camera_dirs(project).map(|dirs| dirs.len() as u32).unwrap_or(0);
    if camera_count == 0 {
        errors.push("No Camera folders found in Footage directory".to_string());
    }

    StructureCheck {
        is_valid: errors.is_empty(),
        errors,
        camera_count,
    }
}

/// A folder that looks like the start of a project but fails validation.
/// The scanner does not descend into these.
pub fn is_partial_project(path: &Path) -> bool {
    path.join(FOOTAGE_DIR).exists() || path.join(GRAPHICS_DIR).exists()
}

/// Footage manifest sorted by (camera, name). Hidden files are ignored.
pub fn footage_files(project: &Path) -> io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();
    let cameras = match camera_dirs(project) {
        Ok(cameras) => cameras,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(files),
        Err(err) => return Err(err),
    };

    for (camera, dir_name) in cameras {
        let camera_path = project.join(FOOTAGE_DIR).join(&dir_name);
        for entry in fs::read_dir(&camera_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden_name(&name) || !entry.path().is_file() {
                continue;
            }
            files.push(FileInfo {
                camera,
                path: format!("{}/{}/{}", FOOTAGE_DIR, dir_name, name),
                name,
            });
        }
    }

    files.sort_by(|a, b| a.camera.cmp(&b.camera).then_with(|| a.name.cmp(&b.name)));
    Ok(files)
}

pub fn scan_current_files(project: &Path) -> Result<Vec<FileInfo>, Error> {
    if !project.is_dir() {
        return Err(Error::Other(format!(
            "Project path is not a directory: {}",
            project.display()
        )));
    }
    Ok(footage_files(project)?)
}

fn is_breadcrumbs_artifact(name: &str) -> bool {
    name == BREADCRUMBS_FILE_NAME || name == BACKUP_FILE_NAME
}

/// Recursive size of the project's files, not counting the breadcrumbs file or its backup.
pub fn folder_size(project: &Path) -> io::Result<u64> {
    Ok(measure_tree(project)?.0)
}

/// One pass over the project tree: total size and newest mtime of non-hidden files.
fn measure_tree(project: &Path) -> io::Result<(u64, Option<DateTime<Utc>>)> {
    fs::read_dir(project)?;

    let mut total = 0u64;
    let mut newest: Option<DateTime<Utc>> = None;

    let walker = WalkDir::new(project)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden_name(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Skipping unreadable entry under {}: {}", project.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.depth() == 1 && is_breadcrumbs_artifact(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("Skipping {}: {}", entry.path().display(), err);
                continue;
            }
        };
        total += metadata.len();
        if let Ok(modified) = metadata.modified() {
            let modified: DateTime<Utc> = modified.into();
            if newest.map_or(true, |n| modified > n) {
                newest = Some(modified);
            }
        }
    }

    Ok((total, newest))
}

pub fn observe_project(project: &Path) -> io::Result<ProjectObservation> {
    let files = footage_files(project)?;
    let camera_count = match camera_dirs(project) {
        Ok(dirs) => dirs.len() as u32,
        Err(err) if err.kind() == io::ErrorKind::NotFound => 0,
        Err(err) => return Err(err),
    };
    let (folder_size, newest_mtime) = measure_tree(project)?;

    Ok(ProjectObservation {
        camera_count,
        files,
        folder_size,
        newest_mtime,
    })
}

/// Why a recorded breadcrumbs file lags behind the folder. Empty means current.
pub fn staleness_reasons(record: &BreadcrumbsFile, observed: &ProjectObservation) -> Vec<String> {
    let mut reasons = Vec::new();

    if record.number_of_cameras != observed.camera_count {
        reasons.push(format!(
            "numberOfCameras is {} but {} camera folders exist",
            record.number_of_cameras, observed.camera_count
        ));
    }

    if let (Some(recorded), Some(newest)) = (record.recorded_at(), observed.newest_mtime) {
        if recorded < newest {
            reasons.push(format!(
                "recorded {} but files changed at {}",
                recorded.to_rfc3339(),
                newest.to_rfc3339()
            ));
        }
    }

    let recorded_files: BTreeSet<(u32, &str)> =
        record.files.iter().map(|f| (f.camera, f.name.as_str())).collect();
    let observed_files: BTreeSet<(u32, &str)> =
        observed.files.iter().map(|f| (f.camera, f.name.as_str())).collect();
    if recorded_files != observed_files {
        reasons.push(format!(
            "file list differs ({} recorded, {} on disk)",
            recorded_files.len(),
            observed_files.len()
        ));
    }

    if let Some(recorded_size) = record.folder_size_bytes {
        if recorded_size.abs_diff(observed.folder_size) >= STALE_SIZE_THRESHOLD_BYTES {
            reasons.push(format!(
                "folder size changed from {} to {} bytes",
                recorded_size, observed.folder_size
            ));
        }
    }

    reasons
}

pub fn is_stale(record: &BreadcrumbsFile, observed: &ProjectObservation) -> bool {
    !staleness_reasons(record, observed).is_empty()
}
