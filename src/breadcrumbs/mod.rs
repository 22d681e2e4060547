//! The per-project `breadcrumbs.json` record.

pub mod links;
pub mod reader;

use serde::{Deserialize, Serialize};

pub use reader::{read_breadcrumbs, ReadOutcome};

pub const BREADCRUMBS_FILE_NAME: &str = "breadcrumbs.json";
pub const BACKUP_FILE_NAME: &str = "breadcrumbs.json.bak";

/// Author stamp written by batch apply.
pub const BAKER_AUTHOR: &str = "Baker";
pub const UPDATED_BY_SUFFIX: &str = " - updated by Baker";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadcrumbsFile {
    #[serde(rename = "projectTitle")]
    pub project_title: String,
    #[serde(rename = "numberOfCameras")]
    pub number_of_cameras: u32,
    pub files: Vec<FileInfo>,
    #[serde(rename = "parentFolder")]
    pub parent_folder: String,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(rename = "creationDateTime")]
    pub creation_date_time: String,
    #[serde(rename = "folderSizeBytes", default, skip_serializing_if = "Option::is_none")]
    pub folder_size_bytes: Option<u64>,
    #[serde(rename = "lastModified", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(rename = "scannedBy", default, skip_serializing_if = "Option::is_none")]
    pub scanned_by: Option<String>,

    /// Single-card link written by older versions. Kept in sync with the first entry of
    /// `trello_cards` on every write.
    #[serde(rename = "trelloCardUrl", default, skip_serializing_if = "Option::is_none")]
    pub trello_card_url: Option<String>,

    #[serde(rename = "videoLinks", default, skip_serializing_if = "Option::is_none")]
    pub video_links: Option<Vec<VideoLink>>,

    #[serde(rename = "trelloCards", default, skip_serializing_if = "Option::is_none")]
    pub trello_cards: Option<Vec<TrelloCard>>,
}

/// One footage file. `path` is relative to the project folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileInfo {
    pub camera: u32,
    pub name: String,
    pub path: String,
}

impl FileInfo {
    pub fn new(camera: u32, name: &str) -> Self {
        Self {
            camera,
            name: name.to_string(),
            path: format!("Footage/Camera {}/{}", camera, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrelloCard {
    pub url: String,
    #[serde(rename = "cardId")]
    pub card_id: String,
    pub title: String,
    #[serde(rename = "boardName", default, skip_serializing_if = "Option::is_none")]
    pub board_name: Option<String>,
    #[serde(rename = "lastFetched", default, skip_serializing_if = "Option::is_none")]
    pub last_fetched: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoLink {
    pub url: String,
    #[serde(rename = "sproutVideoId", default, skip_serializing_if = "Option::is_none")]
    pub sprout_video_id: Option<String>,
    pub title: String,
    #[serde(rename = "thumbnailUrl", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "uploadDate", default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(rename = "sourceRenderFile", default, skip_serializing_if = "Option::is_none")]
    pub source_render_file: Option<String>,
}

impl BreadcrumbsFile {
    /// Checks the invariants serde cannot express. Returns the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.project_title.trim().is_empty() {
            return Err("projectTitle is empty".to_string());
        }
        if let Some(file) = self.files.iter().find(|f| f.camera < 1) {
            return Err(format!("file '{}' has camera number {}", file.name, file.camera));
        }
        if let Some(file) = self.files.iter().find(|f| f.name.is_empty()) {
            return Err(format!("file entry with path '{}' has no name", file.path));
        }
        Ok(())
    }

    /// Newest of `lastModified` and `creationDateTime` that parses as RFC 3339.
    pub fn recorded_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let parse = |s: &str| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc))
        };
        self.last_modified
            .as_deref()
            .and_then(parse)
            .or_else(|| parse(&self.creation_date_time))
    }
}
