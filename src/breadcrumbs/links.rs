//! Editing the video and card links stored in a project's breadcrumbs.
//!
//! Every edit reads the current record, changes the link list, bumps `lastModified`
//! and writes the record back. Observed fields (files, cameras, size) are never touched.

use chrono::Utc;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use super::reader::{read_breadcrumbs, write_breadcrumbs, ReadOutcome};
use super::{BreadcrumbsFile, TrelloCard, VideoLink};
use crate::error::Error;
use crate::reconcile::{sync_legacy_card_url, timestamp};

pub const MAX_VIDEO_LINKS: usize = 20;
pub const MAX_TRELLO_CARDS: usize = 10;

fn card_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"trello\.com/c/([a-zA-Z0-9]{8,24})").ok())
        .as_ref()
}

pub fn extract_card_id(url: &str) -> Option<String> {
    card_url_pattern()?
        .captures(url)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Cards linked from a record. Falls back to the legacy single URL when the card list
/// is missing or empty.
pub fn linked_cards(record: &BreadcrumbsFile) -> Vec<TrelloCard> {
    if let Some(cards) = record.trello_cards.as_ref().filter(|c| !c.is_empty()) {
        return cards.clone();
    }

    record
        .trello_card_url
        .as_deref()
        .and_then(|url| {
            extract_card_id(url).map(|card_id| placeholder_card(url, card_id))
        })
        .into_iter()
        .collect()
}

/// A card known only by its URL.
pub fn placeholder_card(url: &str, card_id: String) -> TrelloCard {
    TrelloCard {
        url: url.to_string(),
        title: format!("Card {}", card_id),
        card_id,
        board_name: None,
        last_fetched: None,
    }
}

fn load(project: &Path) -> Result<Option<BreadcrumbsFile>, Error> {
    match read_breadcrumbs(project) {
        ReadOutcome::Absent => Ok(None),
        ReadOutcome::Present(record) => Ok(Some(record)),
        ReadOutcome::Corrupted { kind, reason } => {
            Err(Error::UnreadableBreadcrumbs { kind, reason })
        }
    }
}

fn load_existing(project: &Path) -> Result<BreadcrumbsFile, Error> {
    load(project)?.ok_or_else(|| Error::NoBreadcrumbs(project.display().to_string()))
}

fn save(project: &Path, mut record: BreadcrumbsFile) -> Result<BreadcrumbsFile, Error> {
    record.last_modified = Some(timestamp(Utc::now()));
    write_breadcrumbs(project, &record)?;
    Ok(record)
}

fn check_index(what: &'static str, index: usize, len: usize) -> Result<(), Error> {
    if index >= len {
        return Err(Error::IndexOutOfBounds { what, index, len });
    }
    Ok(())
}

/// Video links of a project; empty when it has no breadcrumbs yet.
pub fn video_links(project: &Path) -> Result<Vec<VideoLink>, Error> {
    Ok(load(project)?
        .and_then(|record| record.video_links)
        .unwrap_or_default())
}

pub fn associate_video_link(project: &Path, link: VideoLink) -> Result<BreadcrumbsFile, Error> {
    let mut record = load_existing(project)?;
    let videos = record.video_links.get_or_insert_with(Vec::new);
    if videos.len() >= MAX_VIDEO_LINKS {
        return Err(Error::LimitReached {
            what: "videos",
            limit: MAX_VIDEO_LINKS,
        });
    }
    debug!("Linking video {} to {}", link.url, project.display());
    videos.push(link);
    save(project, record)
}

pub fn remove_video_link(project: &Path, index: usize) -> Result<BreadcrumbsFile, Error> {
    let mut record = load_existing(project)?;
    let videos = record.video_links.get_or_insert_with(Vec::new);
    check_index("Video", index, videos.len())?;
    videos.remove(index);
    save(project, record)
}

pub fn update_video_link(
    project: &Path,
    index: usize,
    link: VideoLink,
) -> Result<BreadcrumbsFile, Error> {
    let mut record = load_existing(project)?;
    let videos = record.video_links.get_or_insert_with(Vec::new);
    check_index("Video", index, videos.len())?;
    videos[index] = link;
    save(project, record)
}

/// Move the video at `from` so it ends up at position `to`.
pub fn reorder_video_links(project: &Path, from: usize, to: usize) -> Result<BreadcrumbsFile, Error> {
    let mut record = load_existing(project)?;
    let videos = record.video_links.get_or_insert_with(Vec::new);
    check_index("Video", from, videos.len())?;
    check_index("Video", to, videos.len())?;
    let video = videos.remove(from);
    videos.insert(to, video);
    save(project, record)
}

/// Linked cards of a project, with a legacy single URL shown as one card.
pub fn trello_cards(project: &Path) -> Result<Vec<TrelloCard>, Error> {
    Ok(load(project)?
        .map(|record| linked_cards(&record))
        .unwrap_or_default())
}

/// Cards as they will be stored: a legacy URL becomes the first list entry.
fn materialized_cards(record: &mut BreadcrumbsFile) -> &mut Vec<TrelloCard> {
    let cards = linked_cards(record);
    record.trello_cards.insert(cards)
}

pub fn associate_trello_card(project: &Path, card: TrelloCard) -> Result<BreadcrumbsFile, Error> {
    let mut record = load_existing(project)?;
    let cards = materialized_cards(&mut record);
    if cards.len() >= MAX_TRELLO_CARDS {
        return Err(Error::LimitReached {
            what: "cards",
            limit: MAX_TRELLO_CARDS,
        });
    }
    if cards.iter().any(|c| c.card_id == card.card_id) {
        return Err(Error::DuplicateCard(card.card_id));
    }
    debug!("Linking card {} to {}", card.card_id, project.display());
    cards.push(card);
    sync_legacy_card_url(&mut record);
    save(project, record)
}

pub fn remove_trello_card(project: &Path, index: usize) -> Result<BreadcrumbsFile, Error> {
    let mut record = load_existing(project)?;
    let cards = materialized_cards(&mut record);
    check_index("Card", index, cards.len())?;
    cards.remove(index);
    sync_legacy_card_url(&mut record);
    save(project, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breadcrumbs::FileInfo;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    fn record() -> BreadcrumbsFile {
        BreadcrumbsFile {
            project_title: "Launch".to_string(),
            number_of_cameras: 1,
            files: vec![FileInfo::new(1, "a.mp4")],
            parent_folder: "/media".to_string(),
            created_by: "Editor".to_string(),
            creation_date_time: "2024-01-01T00:00:00Z".to_string(),
            folder_size_bytes: Some(10),
            last_modified: Some("2024-01-01T00:00:00Z".to_string()),
            scanned_by: None,
            trello_card_url: None,
            video_links: None,
            trello_cards: None,
        }
    }

    fn video(n: usize) -> VideoLink {
        VideoLink {
            url: format!("https://videos.example/v/{}", n),
            sprout_video_id: None,
            title: format!("Cut {}", n),
            thumbnail_url: None,
            upload_date: None,
            source_render_file: None,
        }
    }

    fn card(id: &str) -> TrelloCard {
        TrelloCard {
            url: format!("https://trello.com/c/{}", id),
            card_id: id.to_string(),
            title: id.to_string(),
            board_name: None,
            last_fetched: None,
        }
    }

    fn titles(record: &BreadcrumbsFile) -> Vec<String> {
        record
            .video_links
            .iter()
            .flatten()
            .map(|v| v.title.clone())
            .collect()
    }

    #[test]
    fn test_extract_card_id() {
        assert_eq!(
            extract_card_id("https://trello.com/c/AbCd1234/42-launch"),
            Some("AbCd1234".to_string())
        );
        assert_eq!(extract_card_id("https://trello.com/c/short"), None);
        assert_eq!(extract_card_id("https://example.com/c/AbCd1234"), None);
    }

    #[test]
    fn test_video_links_edit_cycle() {
        let dir = tempdir().unwrap();
        write_breadcrumbs(dir.path(), &record()).unwrap();

        for n in 0..3 {
            associate_video_link(dir.path(), video(n)).unwrap();
        }
        let updated = reorder_video_links(dir.path(), 2, 0).unwrap();
        assert_eq!(titles(&updated), vec!["Cut 2", "Cut 0", "Cut 1"]);

        update_video_link(dir.path(), 1, video(9)).unwrap();
        let updated = remove_video_link(dir.path(), 0).unwrap();
        assert_eq!(titles(&updated), vec!["Cut 9", "Cut 1"]);

        let stored = video_links(dir.path()).unwrap();
        assert_eq!(stored.len(), 2);
        let on_disk = read_breadcrumbs(dir.path()).into_record().unwrap();
        assert_ne!(on_disk.last_modified.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(on_disk.files, record().files);
    }

    #[test]
    fn test_video_index_out_of_bounds() {
        let dir = tempdir().unwrap();
        write_breadcrumbs(dir.path(), &record()).unwrap();
        let err = remove_video_link(dir.path(), 0).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 0, len: 0, .. }));

        associate_video_link(dir.path(), video(0)).unwrap();
        let err = reorder_video_links(dir.path(), 0, 1).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 1, len: 1, .. }));
        assert_eq!(video_links(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_video_limit() {
        let dir = tempdir().unwrap();
        let mut full = record();
        full.video_links = Some((0..MAX_VIDEO_LINKS).map(video).collect());
        write_breadcrumbs(dir.path(), &full).unwrap();

        let err = associate_video_link(dir.path(), video(99)).unwrap_err();
        assert_eq!(err.to_string(), "Maximum of 20 videos per project reached");
        assert_eq!(video_links(dir.path()).unwrap().len(), MAX_VIDEO_LINKS);
    }

    #[test]
    fn test_card_limit_and_duplicates() {
        let dir = tempdir().unwrap();
        write_breadcrumbs(dir.path(), &record()).unwrap();

        let updated = associate_trello_card(dir.path(), card("first111")).unwrap();
        assert_eq!(
            updated.trello_card_url.as_deref(),
            Some("https://trello.com/c/first111")
        );
        let err = associate_trello_card(dir.path(), card("first111")).unwrap_err();
        assert!(matches!(err, Error::DuplicateCard(id) if id == "first111"));

        for n in 1..MAX_TRELLO_CARDS {
            associate_trello_card(dir.path(), card(&format!("card{:04}", n))).unwrap();
        }
        let err = associate_trello_card(dir.path(), card("overflow1")).unwrap_err();
        assert!(matches!(err, Error::LimitReached { limit: 10, .. }));
    }

    #[test]
    fn test_removing_last_card_clears_legacy_url() {
        let dir = tempdir().unwrap();
        let mut legacy = record();
        legacy.trello_card_url = Some("https://trello.com/c/legacy123/x".to_string());
        write_breadcrumbs(dir.path(), &legacy).unwrap();

        let cards = trello_cards(dir.path()).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].card_id, "legacy123");

        let updated = associate_trello_card(dir.path(), card("second22")).unwrap();
        let ids: Vec<&str> = updated
            .trello_cards
            .iter()
            .flatten()
            .map(|c| c.card_id.as_str())
            .collect();
        assert_eq!(ids, vec!["legacy123", "second22"]);

        remove_trello_card(dir.path(), 0).unwrap();
        let updated = remove_trello_card(dir.path(), 0).unwrap();
        assert_eq!(updated.trello_cards, Some(Vec::new()));
        assert_eq!(updated.trello_card_url, None);

        let err = remove_trello_card(dir.path(), 0).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { len: 0, .. }));
    }

    #[test]
    fn test_edits_need_a_readable_record() {
        let dir = tempdir().unwrap();
        assert!(video_links(dir.path()).unwrap().is_empty());
        let err = associate_video_link(dir.path(), video(0)).unwrap_err();
        assert!(matches!(err, Error::NoBreadcrumbs(_)));

        fs::write(dir.path().join("breadcrumbs.json"), "{ broken").unwrap();
        let err = associate_trello_card(dir.path(), card("abcdefgh")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
        assert_eq!(
            fs::read_to_string(dir.path().join("breadcrumbs.json")).unwrap(),
            "{ broken"
        );
    }
}
