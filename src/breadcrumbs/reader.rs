use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{BreadcrumbsFile, BACKUP_FILE_NAME, BREADCRUMBS_FILE_NAME};
use crate::error::{Error, ErrorKind};

/// Result of looking for a project's breadcrumbs file. Reading never fails; every
/// problem lands in one of the three variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Absent,
    Present(BreadcrumbsFile),
    Corrupted { kind: ErrorKind, reason: String },
}

impl ReadOutcome {
    pub fn is_present(&self) -> bool {
        matches!(self, ReadOutcome::Present(_))
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, ReadOutcome::Corrupted { .. })
    }

    pub fn record(&self) -> Option<&BreadcrumbsFile> {
        match self {
            ReadOutcome::Present(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<BreadcrumbsFile> {
        match self {
            ReadOutcome::Present(record) => Some(record),
            _ => None,
        }
    }
}

pub fn breadcrumbs_path(project: &Path) -> PathBuf {
    project.join(BREADCRUMBS_FILE_NAME)
}

pub fn backup_path(project: &Path) -> PathBuf {
    project.join(BACKUP_FILE_NAME)
}

pub fn read_breadcrumbs(project: &Path) -> ReadOutcome {
    let path = breadcrumbs_path(project);

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("Breadcrumbs check: {} -> missing", project.display());
            return ReadOutcome::Absent;
        }
        Err(err) => {
            debug!("Breadcrumbs check: {} -> unreadable ({})", project.display(), err);
            return ReadOutcome::Corrupted {
                kind: ErrorKind::from_io(&err),
                reason: format!("Failed to read breadcrumbs file: {}", err),
            };
        }
    };

    parse_breadcrumbs(&content).unwrap_or_else(|reason| {
        debug!("Breadcrumbs check: {} -> invalid ({})", project.display(), reason);
        ReadOutcome::Corrupted {
            kind: ErrorKind::Corruption,
            reason,
        }
    })
}

/// Decode and validate file content. `Err` carries the human-readable reason.
pub fn parse_breadcrumbs(content: &str) -> Result<ReadOutcome, String> {
    let record: BreadcrumbsFile = serde_json::from_str(content)
        .map_err(|e| format!("Failed to parse breadcrumbs file: {}", e))?;
    record
        .validate()
        .map_err(|e| format!("Invalid breadcrumbs file: {}", e))?;
    Ok(ReadOutcome::Present(record))
}

/// Raw file content, `None` when the file does not exist.
pub fn read_raw(project: &Path) -> Result<Option<String>, Error> {
    if !project.exists() {
        return Err(Error::Other(format!(
            "Project path does not exist: {}",
            project.display()
        )));
    }
    match fs::read_to_string(breadcrumbs_path(project)) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn write_breadcrumbs(project: &Path, record: &BreadcrumbsFile) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(record)?;
    fs::write(breadcrumbs_path(project), json)?;
    Ok(())
}

/// Copy the current breadcrumbs file to its `.bak` sibling, replacing any older backup.
pub fn backup_breadcrumbs(project: &Path) -> io::Result<PathBuf> {
    let backup = backup_path(project);
    fs::copy(breadcrumbs_path(project), &backup)?;
    Ok(backup)
}
