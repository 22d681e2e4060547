//! Field-level comparison of an existing breadcrumbs record against its reconciled target.
//!
//! The full diff decides whether a write is needed at all. The meaningful diff drops
//! pure bookkeeping (timestamps, scanner stamp, sub-threshold size drift) and decides
//! whether the operator is told the project needs attention.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::breadcrumbs::{BreadcrumbsFile, FileInfo};
use crate::scanner::project::STALE_SIZE_THRESHOLD_BYTES;

pub const FILES_FIELD: &str = "files";
pub const FOLDER_SIZE_FIELD: &str = "folderSizeBytes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    Content,
    Metadata,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Full,
    Meaningful,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub field: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub category: ChangeCategory,
    pub impact: Impact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl DiffCounts {
    pub fn changed(&self) -> usize {
        self.added + self.modified + self.removed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreadcrumbsDiff {
    pub changes: Vec<ChangeRecord>,
    pub counts: DiffCounts,
}

impl BreadcrumbsDiff {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn by_category(&self, category: ChangeCategory) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(move |c| c.category == category)
    }

    fn push(&mut self, record: ChangeRecord) {
        match record.change_type {
            ChangeType::Added => self.counts.added += 1,
            ChangeType::Modified => self.counts.modified += 1,
            ChangeType::Removed => self.counts.removed += 1,
        }
        self.changes.push(record);
    }
}

/// Whether the project had a readable record before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingState {
    Absent,
    Present,
    Corrupted,
}

/// Both diff modes for one project.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDiff {
    pub path: String,
    pub name: String,
    pub existing: ExistingState,
    pub full: BreadcrumbsDiff,
    pub meaningful: BreadcrumbsDiff,
}

impl ProjectDiff {
    pub fn new(
        path: &str,
        name: &str,
        existing_state: ExistingState,
        existing: Option<&BreadcrumbsFile>,
        target: &BreadcrumbsFile,
    ) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            existing: existing_state,
            full: compare(existing, target, DiffMode::Full),
            meaningful: compare(existing, target, DiffMode::Meaningful),
        }
    }

    pub fn needs_write(&self) -> bool {
        self.full.has_changes()
    }

    pub fn needs_attention(&self) -> bool {
        self.meaningful.has_changes()
    }
}

struct FieldSpec {
    name: &'static str,
    category: ChangeCategory,
    impact: Impact,
    bookkeeping: bool,
    get: fn(&BreadcrumbsFile) -> Option<Value>,
}

const SCALAR_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "projectTitle",
        category: ChangeCategory::Content,
        impact: Impact::Medium,
        bookkeeping: false,
        get: |b| Some(json!(b.project_title)),
    },
    FieldSpec {
        name: "numberOfCameras",
        category: ChangeCategory::Content,
        impact: Impact::High,
        bookkeeping: false,
        get: |b| Some(json!(b.number_of_cameras)),
    },
    FieldSpec {
        name: "parentFolder",
        category: ChangeCategory::Metadata,
        impact: Impact::Medium,
        bookkeeping: false,
        get: |b| Some(json!(b.parent_folder)),
    },
    FieldSpec {
        name: "createdBy",
        category: ChangeCategory::Metadata,
        impact: Impact::Low,
        bookkeeping: false,
        get: |b| Some(json!(b.created_by)),
    },
    FieldSpec {
        name: "creationDateTime",
        category: ChangeCategory::Metadata,
        impact: Impact::Low,
        bookkeeping: false,
        get: |b| Some(json!(b.creation_date_time)),
    },
    FieldSpec {
        name: "trelloCards",
        category: ChangeCategory::Metadata,
        impact: Impact::Medium,
        bookkeeping: false,
        get: |b| b.trello_cards.as_ref().map(|v| json!(v)),
    },
    FieldSpec {
        name: "trelloCardUrl",
        category: ChangeCategory::Metadata,
        impact: Impact::Medium,
        bookkeeping: false,
        get: |b| b.trello_card_url.as_ref().map(|v| json!(v)),
    },
    FieldSpec {
        name: "videoLinks",
        category: ChangeCategory::Metadata,
        impact: Impact::Medium,
        bookkeeping: false,
        get: |b| b.video_links.as_ref().map(|v| json!(v)),
    },
    FieldSpec {
        name: FOLDER_SIZE_FIELD,
        category: ChangeCategory::Maintenance,
        impact: Impact::Low,
        bookkeeping: false,
        get: |b| b.folder_size_bytes.map(|v| json!(v)),
    },
    FieldSpec {
        name: "lastModified",
        category: ChangeCategory::Maintenance,
        impact: Impact::Low,
        bookkeeping: true,
        get: |b| b.last_modified.as_ref().map(|v| json!(v)),
    },
    FieldSpec {
        name: "scannedBy",
        category: ChangeCategory::Maintenance,
        impact: Impact::Low,
        bookkeeping: true,
        get: |b| b.scanned_by.as_ref().map(|v| json!(v)),
    },
];

/// Size drift below the staleness threshold is bookkeeping, not a real change.
fn is_minor_size_change(old: Option<&Value>, new: Option<&Value>) -> bool {
    match (old.and_then(Value::as_u64), new.and_then(Value::as_u64)) {
        (Some(old), Some(new)) => old.abs_diff(new) < STALE_SIZE_THRESHOLD_BYTES,
        _ => false,
    }
}

pub fn compare(
    existing: Option<&BreadcrumbsFile>,
    target: &BreadcrumbsFile,
    mode: DiffMode,
) -> BreadcrumbsDiff {
    let mut diff = BreadcrumbsDiff::default();

    for def in SCALAR_FIELDS {
        if mode == DiffMode::Meaningful && def.bookkeeping {
            continue;
        }

        let old = existing.and_then(def.get);
        let new = (def.get)(target);

        if mode == DiffMode::Meaningful
            && def.name == FOLDER_SIZE_FIELD
            && is_minor_size_change(old.as_ref(), new.as_ref())
        {
            diff.counts.unchanged += 1;
            continue;
        }

        let change_type = match (&old, &new) {
            (None, None) => continue,
            (None, Some(_)) => ChangeType::Added,
            (Some(_), None) => ChangeType::Removed,
            (Some(o), Some(n)) if o == n => {
                diff.counts.unchanged += 1;
                continue;
            }
            (Some(_), Some(_)) => ChangeType::Modified,
        };

        diff.push(ChangeRecord {
            field: def.name.to_string(),
            change_type,
            category: def.category,
            impact: def.impact,
            old_value: old,
            new_value: new,
        });
    }

    let no_files: &[FileInfo] = &[];
    let existing_files = existing.map(|b| b.files.as_slice()).unwrap_or(no_files);
    compare_files(existing_files, &target.files, &mut diff);

    diff
}

/// Entries are matched on (camera, name). A matched entry whose path moved is modified.
fn compare_files(existing: &[FileInfo], target: &[FileInfo], diff: &mut BreadcrumbsDiff) {
    let old: BTreeMap<(u32, &str), &FileInfo> =
        existing.iter().map(|f| ((f.camera, f.name.as_str()), f)).collect();
    let new: BTreeMap<(u32, &str), &FileInfo> =
        target.iter().map(|f| ((f.camera, f.name.as_str()), f)).collect();
    let keys: BTreeSet<(u32, &str)> = old.keys().chain(new.keys()).copied().collect();

    for key in keys {
        let (old_value, new_value, change_type) = match (old.get(&key), new.get(&key)) {
            (None, Some(n)) => (None, Some(json!(n)), ChangeType::Added),
            (Some(o), None) => (Some(json!(o)), None, ChangeType::Removed),
            (Some(o), Some(n)) if o.path != n.path => {
                (Some(json!(o)), Some(json!(n)), ChangeType::Modified)
            }
            _ => {
                diff.counts.unchanged += 1;
                continue;
            }
        };

        diff.push(ChangeRecord {
            field: FILES_FIELD.to_string(),
            change_type,
            category: ChangeCategory::Content,
            impact: Impact::High,
            old_value,
            new_value,
        });
    }
}
