//! Builds the breadcrumbs record a project *should* have, given what is on disk now.
//! Batch apply writes exactly this record and the preview diffs against it, so the
//! two can never disagree.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

use crate::breadcrumbs::{BreadcrumbsFile, BAKER_AUTHOR, UPDATED_BY_SUFFIX};
use crate::scanner::project::ProjectObservation;

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn build_target(
    project: &Path,
    existing: Option<&BreadcrumbsFile>,
    observed: &ProjectObservation,
    now: DateTime<Utc>,
) -> BreadcrumbsFile {
    let stamp = timestamp(now);

    let mut target = match existing {
        Some(existing) => {
            let mut target = existing.clone();
            // Records Baker wrote itself keep the plain author stamp.
            if target.created_by != BAKER_AUTHOR && !target.created_by.ends_with(UPDATED_BY_SUFFIX) {
                target.created_by = format!("{}{}", target.created_by, UPDATED_BY_SUFFIX);
            }
            target
        }
        None => BreadcrumbsFile {
            project_title: project
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            number_of_cameras: observed.camera_count,
            files: Vec::new(),
            parent_folder: project
                .parent()
                .unwrap_or(project)
                .to_string_lossy()
                .into_owned(),
            created_by: BAKER_AUTHOR.to_string(),
            creation_date_time: stamp.clone(),
            folder_size_bytes: None,
            last_modified: None,
            scanned_by: None,
            trello_card_url: None,
            video_links: None,
            trello_cards: None,
        },
    };

    target.number_of_cameras = observed.camera_count;
    target.files = observed.files.clone();
    target.folder_size_bytes = Some(observed.folder_size);
    target.last_modified = Some(stamp);
    target.scanned_by = Some(BAKER_AUTHOR.to_string());
    sync_legacy_card_url(&mut target);

    target
}

/// Mirror the first linked card into the legacy single-URL field.
pub fn sync_legacy_card_url(record: &mut BreadcrumbsFile) {
    match record.trello_cards.as_ref().and_then(|cards| cards.first()) {
        Some(card) => record.trello_card_url = Some(card.url.clone()),
        None => {
            if record.trello_cards.is_some() {
                record.trello_card_url = None;
            }
        }
    }
}
