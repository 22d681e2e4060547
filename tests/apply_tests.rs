use std::fs;
use std::path::Path;
use tempfile::tempdir;

use breadcrumbs_baker::breadcrumbs::reader::{backup_path, write_breadcrumbs};
use breadcrumbs_baker::breadcrumbs::TrelloCard;
use breadcrumbs_baker::scanner::project::REQUIRED_SUBFOLDERS;
use breadcrumbs_baker::{
    has_any_changes, prepare_preview, read_breadcrumbs, BatchApplier, BatchOptions, Error,
    ErrorKind, SilentReporter,
};

fn make_project(path: &Path, cameras: &[u32]) -> String {
    for folder in REQUIRED_SUBFOLDERS {
        fs::create_dir_all(path.join(folder)).unwrap();
    }
    for camera in cameras {
        let dir = path.join("Footage").join(format!("Camera {}", camera));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("clip.mp4"), vec![0u8; 2048]).unwrap();
    }
    path.to_string_lossy().into_owned()
}

fn creating() -> BatchOptions {
    BatchOptions {
        create_missing: true,
        backup_originals: true,
        max_concurrency: 2,
    }
}

#[test]
fn test_empty_batch_is_rejected() {
    let none: Vec<String> = vec![];
    let err = BatchApplier::new(creating()).apply(&none, &SilentReporter).unwrap_err();
    assert!(matches!(err, Error::EmptySelection));
}

#[test]
fn test_mixed_batch_partitions_every_path() {
    let tmp = tempdir().unwrap();
    let fresh = make_project(&tmp.path().join("Fresh"), &[1]);
    let existing = make_project(&tmp.path().join("Existing"), &[1, 2]);
    BatchApplier::new(creating())
        .apply(&[existing.clone()], &SilentReporter)
        .unwrap();
    let missing = tmp.path().join("Missing").to_string_lossy().into_owned();
    let loose = tmp.path().join("Loose");
    fs::create_dir_all(&loose).unwrap();
    let loose = loose.to_string_lossy().into_owned();

    let inputs = vec![fresh.clone(), existing.clone(), missing.clone(), loose.clone()];
    let result = BatchApplier::new(creating())
        .apply(&inputs, &SilentReporter)
        .unwrap();

    assert_eq!(result.created, vec![fresh.clone()]);
    assert_eq!(result.updated, vec![existing.clone()]);
    assert_eq!(result.successful, vec![fresh, existing]);
    assert!(result.skipped.is_empty());
    assert_eq!(result.failed.len(), 2);
    assert_eq!(result.failed[0].path, missing);
    assert_eq!(result.failed[0].kind, ErrorKind::Filesystem);
    assert_eq!(result.failed[1].path, loose);
    assert_eq!(result.failed[1].kind, ErrorKind::Structure);

    for path in &result.successful {
        assert!(!result.failed.iter().any(|f| &f.path == path));
    }
    assert_eq!(result.total(), inputs.len());
}

#[test]
fn test_absent_without_create_missing_is_noop() {
    let tmp = tempdir().unwrap();
    let project = make_project(&tmp.path().join("P"), &[1]);
    let options = BatchOptions {
        create_missing: false,
        ..creating()
    };

    let result = BatchApplier::new(options).apply(&[project.clone()], &SilentReporter).unwrap();
    assert!(result.created.is_empty());
    assert!(result.updated.is_empty());
    assert!(result.failed.is_empty());
    assert!(result.successful.is_empty());
    assert_eq!(result.skipped, vec![project.clone()]);
    assert!(!Path::new(&project).join("breadcrumbs.json").exists());
}

#[test]
fn test_backup_written_only_for_existing_files() {
    let tmp = tempdir().unwrap();
    let project = make_project(&tmp.path().join("P"), &[1]);
    let applier = BatchApplier::new(creating());

    applier.apply(&[project.clone()], &SilentReporter).unwrap();
    assert!(!backup_path(Path::new(&project)).exists());

    let before = fs::read_to_string(Path::new(&project).join("breadcrumbs.json")).unwrap();
    applier.apply(&[project.clone()], &SilentReporter).unwrap();
    let backup = fs::read_to_string(backup_path(Path::new(&project))).unwrap();
    assert_eq!(backup, before);
}

#[test]
fn test_backup_can_be_disabled() {
    let tmp = tempdir().unwrap();
    let project = make_project(&tmp.path().join("P"), &[1]);
    let options = BatchOptions {
        backup_originals: false,
        ..creating()
    };
    let applier = BatchApplier::new(options);
    applier.apply(&[project.clone()], &SilentReporter).unwrap();
    let result = applier.apply(&[project.clone()], &SilentReporter).unwrap();
    assert_eq!(result.updated, vec![project.clone()]);
    assert!(!backup_path(Path::new(&project)).exists());
}

#[test]
fn test_second_pass_has_no_meaningful_changes() {
    let tmp = tempdir().unwrap();
    let a = make_project(&tmp.path().join("A"), &[1, 2]);
    let b = make_project(&tmp.path().join("B"), &[1]);
    let paths = vec![a, b];

    let before = prepare_preview(&paths, chrono::Utc::now());
    assert!(has_any_changes(&before.summary));
    assert_eq!(before.summary.projects_with_changes, 2);

    let applier = BatchApplier::new(creating());
    applier.apply(&paths, &SilentReporter).unwrap();
    let after = prepare_preview(&paths, chrono::Utc::now());
    assert!(!has_any_changes(&after.summary));
    assert!(after.projects.iter().all(|p| !p.needs_attention));

    let result = applier.apply(&paths, &SilentReporter).unwrap();
    assert_eq!(result.updated.len(), 2);
    let again = prepare_preview(&paths, chrono::Utc::now());
    assert!(!has_any_changes(&again.summary));
}

#[test]
fn test_update_keeps_links_and_refreshes_observations() {
    let tmp = tempdir().unwrap();
    let project_dir = tmp.path().join("P");
    let project = make_project(&project_dir, &[1]);
    BatchApplier::new(creating()).apply(&[project.clone()], &SilentReporter).unwrap();

    let mut record = read_breadcrumbs(&project_dir).into_record().unwrap();
    record.created_by = "Editor".to_string();
    record.trello_cards = Some(vec![TrelloCard {
        url: "https://trello.com/c/abcd1234/p".to_string(),
        card_id: "abcd1234".to_string(),
        title: "P".to_string(),
        board_name: Some("Edits".to_string()),
        last_fetched: None,
    }]);
    write_breadcrumbs(&project_dir, &record).unwrap();
    fs::create_dir_all(project_dir.join("Footage/Camera 2")).unwrap();
    fs::write(project_dir.join("Footage/Camera 2/b.mp4"), b"b").unwrap();

    let result = BatchApplier::new(creating()).apply(&[project.clone()], &SilentReporter).unwrap();
    assert_eq!(result.updated, vec![project]);

    let updated = read_breadcrumbs(&project_dir).into_record().unwrap();
    assert_eq!(updated.number_of_cameras, 2);
    assert_eq!(updated.files.len(), 2);
    assert_eq!(updated.created_by, "Editor - updated by Baker");
    assert_eq!(updated.scanned_by.as_deref(), Some("Baker"));
    assert_eq!(updated.trello_cards.as_ref().map(|c| c.len()), Some(1));
    assert_eq!(
        updated.trello_card_url.as_deref(),
        Some("https://trello.com/c/abcd1234/p")
    );
}

#[cfg(unix)]
#[test]
fn test_permission_denied_project_fails_alone() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempdir().unwrap();
    let open = make_project(&tmp.path().join("Open"), &[1]);
    let locked_dir = tmp.path().join("Locked");
    let locked = make_project(&locked_dir, &[1]);
    BatchApplier::new(creating())
        .apply(&[locked.clone()], &SilentReporter)
        .unwrap();

    fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked_dir).is_ok() {
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();
        eprintln!("skipping: folder permissions are not enforced for this user");
        return;
    }

    let inputs = vec![locked.clone(), open.clone()];
    let result = BatchApplier::new(creating()).apply(&inputs, &SilentReporter);
    fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755)).unwrap();
    let result = result.unwrap();

    assert_eq!(result.created, vec![open.clone()]);
    assert_eq!(result.successful, vec![open]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].path, locked);
    assert_eq!(result.failed[0].kind, ErrorKind::Permission);
    assert_eq!(result.total(), inputs.len());
    assert!(!backup_path(&locked_dir).exists());
}
