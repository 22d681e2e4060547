//! Best-effort push of a project summary to the cards linked from its breadcrumbs.
//!
//! Runs after a local batch apply. Nothing here can fail the local result: every card
//! update settles on its own and failures come back as values.

pub mod trello;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::apply::BatchUpdateResult;
use crate::breadcrumbs::{read_breadcrumbs, BreadcrumbsFile, ReadOutcome};
use crate::config::AppConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;

pub use crate::breadcrumbs::links::{extract_card_id, linked_cards};
pub use trello::TrelloClient;

pub const BLOCK_START: &str = "<!-- BREADCRUMBS:START -->";
pub const BLOCK_END: &str = "<!-- BREADCRUMBS:END -->";

/// Narrow port onto the external card board.
#[async_trait]
pub trait CardClient: Send + Sync {
    /// Replace (or add) the breadcrumbs block in the card's description.
    async fn update_card_description_block(&self, card_id: &str, block: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub project: String,
    /// `None` when the project itself could not be read back.
    pub card_id: Option<String>,
    pub error: String,
}

pub struct ExternalPropagator {
    client: Option<Arc<dyn CardClient>>,
}

impl ExternalPropagator {
    pub fn new(client: Arc<dyn CardClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// A Trello-backed propagator, or a disabled one when no credentials are configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        match config.trello_credentials() {
            Some(credentials) => Ok(Self::new(Arc::new(TrelloClient::new(credentials)?))),
            None => {
                debug!("No card board credentials configured, sync disabled");
                Ok(Self::disabled())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Sync every created or updated project, one project at a time.
    ///
    /// Returns one entry per failed card update. Empty means everything settled fine,
    /// or there was nothing to do.
    pub async fn propagate(
        &self,
        result: &BatchUpdateResult,
        reporter: &dyn ProgressReporter,
    ) -> Vec<SyncFailure> {
        let Some(client) = &self.client else {
            return Vec::new();
        };

        let projects: Vec<&String> = result.created.iter().chain(result.updated.iter()).collect();
        reporter.on_sync_start(projects.len());
        let started = Instant::now();

        let mut failures = Vec::new();
        for project in projects {
            let (cards, project_failures) = sync_project(client.as_ref(), Path::new(project)).await;
            reporter.on_sync_project(project, cards, project_failures.len());
            failures.extend(project_failures);
        }

        let duration = started.elapsed().as_secs_f64();
        info!(
            "Card sync finished in {:.2}s with {} failures",
            duration,
            failures.len()
        );
        reporter.on_sync_complete(&failures, duration);
        failures
    }
}

/// Push the block for one project to all its cards concurrently.
/// Returns the number of linked cards and the failed updates.
pub async fn sync_project(client: &dyn CardClient, project: &Path) -> (usize, Vec<SyncFailure>) {
    let project_str = project.to_string_lossy().into_owned();

    let record = match read_breadcrumbs(project) {
        ReadOutcome::Present(record) => record,
        ReadOutcome::Absent => {
            return (
                0,
                vec![SyncFailure {
                    project: project_str,
                    card_id: None,
                    error: "Breadcrumbs file is missing after apply".to_string(),
                }],
            )
        }
        ReadOutcome::Corrupted { reason, .. } => {
            return (
                0,
                vec![SyncFailure {
                    project: project_str,
                    card_id: None,
                    error: reason,
                }],
            )
        }
    };

    let cards = linked_cards(&record);
    if cards.is_empty() {
        debug!("{} has no linked cards", project_str);
        return (0, Vec::new());
    }

    let block = format_card_block(&record);
    let updates = cards.iter().map(|card| {
        let block = block.as_str();
        async move {
            let outcome = client.update_card_description_block(&card.card_id, block).await;
            (card, outcome)
        }
    });

    let failures = join_all(updates)
        .await
        .into_iter()
        .filter_map(|(card, outcome)| match outcome {
            Ok(()) => {
                debug!("Synced card {} for {}", card.card_id, project_str);
                None
            }
            Err(err) => {
                warn!("Card {} for {} failed: {:#}", card.card_id, project_str, err);
                Some(SyncFailure {
                    project: project_str.clone(),
                    card_id: Some(card.card_id.clone()),
                    error: format!("{:#}", err),
                })
            }
        })
        .collect();

    (cards.len(), failures)
}

fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// The markdown block pushed to every linked card, wrapped in markers.
pub fn format_card_block(record: &BreadcrumbsFile) -> String {
    let mut lines = vec![
        BLOCK_START.to_string(),
        "**Project breadcrumbs**".to_string(),
        String::new(),
        format!("- Title: {}", record.project_title),
        format!("- Cameras: {}", record.number_of_cameras),
        format!("- Footage files: {}", record.files.len()),
    ];
    if let Some(size) = record.folder_size_bytes {
        lines.push(format!("- Folder size: {}", human_size(size)));
    }
    lines.push(format!("- Created by: {} ({})", record.created_by, record.creation_date_time));
    if let Some(last_modified) = &record.last_modified {
        lines.push(format!("- Last updated: {}", last_modified));
    }
    if let Some(videos) = record.video_links.as_ref().filter(|v| !v.is_empty()) {
        lines.push(String::new());
        lines.push("**Videos**".to_string());
        for video in videos {
            lines.push(format!("- [{}]({})", video.title, video.url));
        }
    }
    lines.push(BLOCK_END.to_string());
    lines.join("\n")
}

/// Swap a previously pushed block for `block`, or append it. Text outside the markers
/// is left as it was.
pub fn merge_description_block(description: &str, block: &str) -> String {
    if let Some(start) = description.find(BLOCK_START) {
        if let Some(end_rel) = description[start..].find(BLOCK_END) {
            let end = start + end_rel + BLOCK_END.len();
            return format!("{}{}{}", &description[..start], block, &description[end..]);
        }
    }

    let existing = description.trim_end();
    if existing.is_empty() {
        block.to_string()
    } else {
        format!("{}\n\n{}", existing, block)
    }
}
