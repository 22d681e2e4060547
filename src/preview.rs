//! Cross-project summary of pending changes, shown to the operator before a batch apply.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::breadcrumbs::{read_breadcrumbs, ReadOutcome};
use crate::diff::{
    ChangeCategory, ChangeRecord, ChangeType, DiffCounts, ExistingState, ProjectDiff,
    FILES_FIELD, FOLDER_SIZE_FIELD,
};
use crate::error::{Error, ErrorKind};
use crate::reconcile::build_target;
use crate::scanner::project::observe_project;

const SECONDS_PER_CHANGED_PROJECT: f64 = 0.5;
const MIN_ESTIMATE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryGroups {
    pub content: Vec<ChangeRecord>,
    pub metadata: Vec<ChangeRecord>,
    pub maintenance: Vec<ChangeRecord>,
}

impl CategoryGroups {
    fn from_changes(changes: &[ChangeRecord]) -> Self {
        let mut groups = Self::default();
        for change in changes {
            let bucket = match change.category {
                ChangeCategory::Content => &mut groups.content,
                ChangeCategory::Metadata => &mut groups.metadata,
                ChangeCategory::Maintenance => &mut groups.maintenance,
            };
            bucket.push(change.clone());
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.content.len() + self.metadata.len() + self.maintenance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPreview {
    pub path: String,
    pub name: String,
    pub existing: ExistingState,
    /// Every pending change, bookkeeping included.
    pub changes: CategoryGroups,
    pub meaningful_changes: usize,
    pub needs_attention: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonChange {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub total_projects: usize,
    /// Projects with at least one meaningful change.
    pub projects_with_changes: usize,
    pub counts: DiffCounts,
    pub common_changes: Vec<CommonChange>,
    pub estimated_duration_ms: u64,
}

impl PreviewSummary {
    pub fn estimated_duration(&self) -> Duration {
        Duration::from_millis(self.estimated_duration_ms)
    }
}

/// A selected project that could not be diffed.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewFailure {
    pub path: String,
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchPreview {
    pub projects: Vec<ProjectPreview>,
    pub summary: PreviewSummary,
    pub failures: Vec<PreviewFailure>,
}

/// Gates the apply action: true when any project has a meaningful change.
pub fn has_any_changes(summary: &PreviewSummary) -> bool {
    summary.projects_with_changes > 0
}

pub fn estimate_duration(projects_with_changes: usize) -> Duration {
    if projects_with_changes == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(projects_with_changes as f64 * SECONDS_PER_CHANGED_PROJECT)
        .max(MIN_ESTIMATE)
}

/// Summarize already computed diffs. Pure: no filesystem access.
pub fn aggregate(diffs: &[ProjectDiff]) -> BatchPreview {
    let mut summary = PreviewSummary {
        total_projects: diffs.len(),
        ..Default::default()
    };
    let mut buckets: BTreeMap<&'static str, usize> = BTreeMap::new();

    let projects = diffs
        .iter()
        .map(|diff| {
            let meaningful = &diff.meaningful;
            if meaningful.has_changes() {
                summary.projects_with_changes += 1;
                for label in change_labels(diff) {
                    *buckets.entry(label).or_insert(0) += 1;
                }
            }
            summary.counts.added += meaningful.counts.added;
            summary.counts.modified += meaningful.counts.modified;
            summary.counts.removed += meaningful.counts.removed;
            summary.counts.unchanged += meaningful.counts.unchanged;

            ProjectPreview {
                path: diff.path.clone(),
                name: diff.name.clone(),
                existing: diff.existing,
                changes: CategoryGroups::from_changes(&diff.full.changes),
                meaningful_changes: meaningful.changes.len(),
                needs_attention: diff.needs_attention(),
            }
        })
        .collect();

    let mut common_changes: Vec<CommonChange> = buckets
        .into_iter()
        .map(|(label, count)| CommonChange {
            label: format!("{} {}", count, label),
            count,
        })
        .collect();
    common_changes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    summary.common_changes = common_changes;
    summary.estimated_duration_ms = estimate_duration(summary.projects_with_changes).as_millis() as u64;

    BatchPreview {
        projects,
        summary,
        failures: Vec::new(),
    }
}

/// Bucket labels a project contributes to, each at most once.
fn change_labels(diff: &ProjectDiff) -> Vec<&'static str> {
    if diff.existing != ExistingState::Present {
        return vec!["new breadcrumbs files"];
    }

    let mut labels: Vec<&'static str> = diff
        .meaningful
        .changes
        .iter()
        .map(|change| match (change.field.as_str(), change.change_type) {
            (FILES_FIELD, ChangeType::Added) => "footage additions",
            (FILES_FIELD, ChangeType::Removed) => "footage removals",
            (FILES_FIELD, ChangeType::Modified) => "footage moves",
            ("numberOfCameras", _) => "camera count updates",
            (FOLDER_SIZE_FIELD, _) => "size recalculations",
            ("trelloCards" | "trelloCardUrl", _) => "card link updates",
            ("videoLinks", _) => "video link updates",
            _ => "metadata updates",
        })
        .collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}

/// Read, observe and diff one project against the record an apply at `now` would write.
pub fn diff_project(path: &Path, now: DateTime<Utc>) -> Result<ProjectDiff, Error> {
    let observed = observe_project(path)?;
    let (state, existing) = match read_breadcrumbs(path) {
        ReadOutcome::Absent => (ExistingState::Absent, None),
        ReadOutcome::Present(record) => (ExistingState::Present, Some(record)),
        ReadOutcome::Corrupted { kind: ErrorKind::Corruption, .. } => {
            (ExistingState::Corrupted, None)
        }
        ReadOutcome::Corrupted { reason, .. } => return Err(Error::Other(reason)),
    };

    let target = build_target(path, existing.as_ref(), &observed, now);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let diff = ProjectDiff::new(
        &path.to_string_lossy(),
        &name,
        state,
        existing.as_ref(),
        &target,
    );
    debug!(
        "Diff {}: {} changes, {} meaningful",
        diff.path,
        diff.full.changes.len(),
        diff.meaningful.changes.len()
    );
    Ok(diff)
}

/// Diff every selected project in parallel and aggregate. Projects that cannot be
/// read end up in `failures` instead of aborting the preview.
pub fn prepare_preview<P: AsRef<Path> + Sync>(paths: &[P], now: DateTime<Utc>) -> BatchPreview {
    let outcomes: Vec<(String, Result<ProjectDiff, Error>)> = paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            (path.to_string_lossy().into_owned(), diff_project(path, now))
        })
        .collect();

    let mut diffs = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(diff) => diffs.push(diff),
            Err(err) => {
                warn!("Cannot preview {}: {}", path, err);
                failures.push(PreviewFailure {
                    path,
                    kind: err.kind(),
                    error: err.to_string(),
                });
            }
        }
    }

    let mut preview = aggregate(&diffs);
    preview.failures = failures;
    info!(
        "Preview: {} projects, {} with changes, {} failed",
        preview.summary.total_projects,
        preview.summary.projects_with_changes,
        preview.failures.len()
    );
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breadcrumbs::{BreadcrumbsFile, FileInfo};

    fn record(cameras: u32, files: Vec<FileInfo>, size: u64) -> BreadcrumbsFile {
        BreadcrumbsFile {
            project_title: "P".to_string(),
            number_of_cameras: cameras,
            files,
            parent_folder: "/media".to_string(),
            created_by: "Baker".to_string(),
            creation_date_time: "2024-01-01T00:00:00Z".to_string(),
            folder_size_bytes: Some(size),
            last_modified: Some("2024-01-01T00:00:00Z".to_string()),
            scanned_by: Some("Baker".to_string()),
            trello_card_url: None,
            video_links: None,
            trello_cards: None,
        }
    }

    fn touched(existing: &BreadcrumbsFile) -> BreadcrumbsFile {
        let mut target = existing.clone();
        target.last_modified = Some("2024-06-01T00:00:00Z".to_string());
        target
    }

    #[test]
    fn test_bookkeeping_only_projects_do_not_count() {
        let existing = record(1, vec![FileInfo::new(1, "a.mp4")], 100);
        let diff = ProjectDiff::new("/p", "p", ExistingState::Present, Some(&existing), &touched(&existing));

        let preview = aggregate(&[diff]);
        assert_eq!(preview.summary.total_projects, 1);
        assert_eq!(preview.summary.projects_with_changes, 0);
        assert!(!has_any_changes(&preview.summary));
        assert_eq!(preview.summary.estimated_duration(), Duration::ZERO);
        assert_eq!(preview.projects[0].changes.maintenance.len(), 1);
        assert!(!preview.projects[0].needs_attention);
    }

    #[test]
    fn test_common_changes_and_counts() {
        let a = record(1, vec![FileInfo::new(1, "a.mp4")], 100);
        let mut a_target = touched(&a);
        a_target.files.push(FileInfo::new(1, "b.mp4"));
        a_target.folder_size_bytes = Some(100_000);

        let b = record(1, vec![], 100);
        let mut b_target = touched(&b);
        b_target.folder_size_bytes = Some(200_000);

        let c_target = record(2, vec![FileInfo::new(1, "x.mp4")], 10);

        let diffs = vec![
            ProjectDiff::new("/a", "a", ExistingState::Present, Some(&a), &a_target),
            ProjectDiff::new("/b", "b", ExistingState::Present, Some(&b), &b_target),
            ProjectDiff::new("/c", "c", ExistingState::Absent, None, &c_target),
        ];
        let preview = aggregate(&diffs);
        let summary = &preview.summary;

        assert_eq!(summary.projects_with_changes, 3);
        assert!(has_any_changes(summary));
        assert_eq!(summary.counts.modified, 2);
        assert_eq!(summary.estimated_duration(), Duration::from_millis(1500));
        assert_eq!(
            summary.common_changes[0],
            CommonChange {
                label: "2 size recalculations".to_string(),
                count: 2
            }
        );
        let labels: Vec<&str> = summary.common_changes.iter().map(|c| c.label.as_str()).collect();
        assert!(labels.contains(&"1 footage additions"));
        assert!(labels.contains(&"1 new breadcrumbs files"));
        assert_eq!(preview.projects[0].changes.content.len(), 1);
    }

    #[test]
    fn test_estimate_has_a_floor() {
        assert_eq!(estimate_duration(0), Duration::ZERO);
        assert_eq!(estimate_duration(1), Duration::from_secs(1));
        assert_eq!(estimate_duration(10), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_project_is_listed_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let preview = prepare_preview(&[missing], Utc::now());
        assert!(preview.projects.is_empty());
        assert_eq!(preview.failures.len(), 1);
        assert_eq!(preview.failures[0].kind, ErrorKind::Filesystem);
    }
}
