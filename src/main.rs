mod cli;
mod logging;
mod status;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use breadcrumbs_baker::breadcrumbs::links::{self, placeholder_card};
use breadcrumbs_baker::breadcrumbs::reader::read_raw;
use breadcrumbs_baker::breadcrumbs::{TrelloCard, VideoLink};
use breadcrumbs_baker::preview::BatchPreview;
use breadcrumbs_baker::propagate::{extract_card_id, linked_cards, TrelloClient};
use breadcrumbs_baker::scanner::project::scan_current_files;
use breadcrumbs_baker::{
    has_any_changes, prepare_preview, read_breadcrumbs, start_scan, validate_folder, AppConfig,
    BatchApplier, BatchOptions, BreadcrumbsFile, Error, ExternalPropagator, ReadOutcome,
    ScanResult,
};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use cli::{ApplyArgs, CardAddArgs, Cli, Commands, ScanArgs, VideoFields};
use colored::*;
use dotenv::dotenv;
use status::CliReporter;
use tracing::{debug, error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match breadcrumbs_baker::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };
    debug!("config: {:?}", config);

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Scan(args)) => run_scan(&config, args),
        Some(Commands::Preview(args)) => run_preview(&args.paths),
        Some(Commands::Apply(args)) => run_apply(&config, args),
        Some(Commands::Validate(args)) => run_validate(&args.path),
        Some(Commands::Files(args)) => run_files(&args.path),
        Some(Commands::Cards(args)) => run_cards(&args.path),
        Some(Commands::CardAdd(args)) => run_card_add(&config, args),
        Some(Commands::CardRemove(args)) => {
            report_links(links::remove_trello_card(&args.path, args.index))
        }
        Some(Commands::Videos(args)) => run_videos(&args.path),
        Some(Commands::VideoAdd(args)) => report_links(links::associate_video_link(
            &args.path,
            video_link(args.video),
        )),
        Some(Commands::VideoUpdate(args)) => report_links(links::update_video_link(
            &args.path,
            args.index,
            video_link(args.video),
        )),
        Some(Commands::VideoRemove(args)) => {
            report_links(links::remove_video_link(&args.path, args.index))
        }
        Some(Commands::VideoMove(args)) => {
            report_links(links::reorder_video_links(&args.path, args.from, args.to))
        }
        Some(Commands::PrintConfig) => print_config(&config),
        None => Cli::command().print_long_help().map_err(Into::into),
    };

    if let Err(err) = outcome {
        error!("Error: {}", err);
        process::exit(1);
    }

    Ok(())
}

fn run_scan(config: &AppConfig, args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = config.scan.clone();
    if let Some(max_depth) = args.max_depth {
        options.max_depth = max_depth;
    }
    options.include_hidden |= args.include_hidden;

    let roots: Vec<PathBuf> = match args.root {
        Some(root) => vec![root],
        None => config.scan_roots().into_iter().map(PathBuf::from).collect(),
    };
    if roots.is_empty() {
        return Err("No root given and no root_paths configured".into());
    }

    for root in roots {
        info!("Scanning {}", root.display());
        let handle = start_scan(root, options.clone(), &config.ignore_patterns);
        let result = status::follow_scan(handle)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_scan_result(&result);
        }
    }

    Ok(())
}

fn print_scan_result(result: &ScanResult) {
    for project in &result.projects {
        let state = if project.invalid_breadcrumbs {
            "corrupted".red()
        } else if !project.has_breadcrumbs {
            "missing".yellow()
        } else if project.stale_breadcrumbs {
            "stale".yellow()
        } else {
            "current".green()
        };
        let validity = if project.is_valid {
            "".normal()
        } else {
            " (invalid structure)".red()
        };
        println!("  {} [{}]{}", project.path, state, validity);
    }

    info!(
        "{} projects ({} valid), {} need attention, {} folders scanned",
        format!("{}", result.projects.len()).cyan(),
        format!("{}", result.valid_projects).green(),
        format!("{}", result.projects.iter().filter(|p| p.needs_attention()).count()).yellow(),
        result.total_folders,
    );
    for err in &result.errors {
        println!("  {} {} [{}]: {}", "!".red(), err.path, err.kind, err.message);
    }
}

fn print_preview(preview: &BatchPreview) {
    for project in &preview.projects {
        let marker = if project.needs_attention {
            "*".yellow()
        } else {
            " ".normal()
        };
        println!(
            "{} {} - {} content, {} metadata, {} maintenance",
            marker,
            project.path,
            project.changes.content.len(),
            project.changes.metadata.len(),
            project.changes.maintenance.len()
        );
    }
    for failure in &preview.failures {
        println!("{} {} [{}]: {}", "!".red(), failure.path, failure.kind, failure.error);
    }

    let summary = &preview.summary;
    info!(
        "{} of {} projects have changes: {} added, {} modified, {} removed (about {:.1}s)",
        format!("{}", summary.projects_with_changes).yellow(),
        summary.total_projects,
        summary.counts.added,
        summary.counts.modified,
        summary.counts.removed,
        summary.estimated_duration().as_secs_f64(),
    );
    for common in &summary.common_changes {
        println!("  - {}", common.label);
    }
}

fn run_preview(paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let preview = prepare_preview(paths, Utc::now());
    print_preview(&preview);
    Ok(())
}

fn run_apply(config: &AppConfig, args: ApplyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = BatchOptions::from_config(config);
    options.create_missing |= args.create_missing;
    options.backup_originals |= args.backup;

    let preview = prepare_preview(&args.paths, Utc::now());
    print_preview(&preview);
    if !has_any_changes(&preview.summary) {
        info!("No meaningful changes pending; only bookkeeping fields will be refreshed");
    }

    if !args.yes {
        if !console::user_attended() {
            return Err("Not attached to a terminal; pass --yes to apply without confirmation".into());
        }
        let prompt = format!("Write breadcrumbs to {} projects?", args.paths.len());
        if !prompt_confirm(&prompt, Some(false))? {
            info!("Nothing written");
            return Ok(());
        }
    }

    let reporter = CliReporter::new();
    let result = BatchApplier::new(options).apply(&args.paths, &reporter)?;

    let sync_failures = if args.no_sync {
        Vec::new()
    } else {
        let propagator = ExternalPropagator::from_config(config)?;
        if propagator.is_enabled() {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(propagator.propagate(&result, &reporter))
        } else {
            Vec::new()
        }
    };

    println!();
    info!(
        "Local data saved: {} successful, {} failed, {} created, {} updated, {} skipped",
        format!("{}", result.successful.len()).green(),
        format!("{}", result.failed.len()).red(),
        format!("{}", result.created.len()).cyan(),
        format!("{}", result.updated.len()).cyan(),
        result.skipped.len(),
    );
    for failure in &result.failed {
        println!("  {} {} [{}]: {}", "✗".red(), failure.path, failure.kind, failure.error);
    }
    info!(
        "{} external syncs failed",
        format!("{}", sync_failures.len()).red()
    );
    for failure in &sync_failures {
        println!(
            "  {} {} card {}: {}",
            "✗".red(),
            failure.project,
            failure.card_id.as_deref().unwrap_or("-"),
            failure.error
        );
    }

    Ok(())
}

fn run_validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let project = validate_folder(path)?;
    let verdict = if project.is_valid {
        "valid".green()
    } else {
        "invalid".red()
    };
    println!("{} is {} ({} cameras)", project.path, verdict, project.camera_count);
    for err in &project.validation_errors {
        println!("  - {}", err);
    }
    match read_breadcrumbs(path) {
        ReadOutcome::Absent => println!("  breadcrumbs: {}", "missing".yellow()),
        ReadOutcome::Present(_) if project.stale_breadcrumbs => {
            println!("  breadcrumbs: {}", "stale".yellow())
        }
        ReadOutcome::Present(_) => println!("  breadcrumbs: {}", "current".green()),
        ReadOutcome::Corrupted { reason, .. } => {
            println!("  breadcrumbs: {} ({})", "corrupted".red(), reason)
        }
    }
    Ok(())
}

fn run_files(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    for file in scan_current_files(path)? {
        println!("  camera {}: {}", file.camera, file.path);
    }
    Ok(())
}

fn run_cards(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if read_raw(path)?.is_none() {
        println!("{} has no breadcrumbs file", path.display());
        return Ok(());
    }
    print_cards(&links::trello_cards(path)?);
    Ok(())
}

fn print_cards(cards: &[TrelloCard]) {
    if cards.is_empty() {
        println!("No linked cards");
    }
    for (index, card) in cards.iter().enumerate() {
        let board = card.board_name.as_deref().unwrap_or("-");
        println!(
            "  {} {} {} [{}] ({})",
            index,
            card.card_id.cyan(),
            card.title,
            board,
            card.url
        );
    }
}

fn run_videos(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    print_videos(&links::video_links(path)?);
    Ok(())
}

fn print_videos(videos: &[VideoLink]) {
    if videos.is_empty() {
        println!("No linked videos");
    }
    for (index, video) in videos.iter().enumerate() {
        println!("  {} {} ({})", index, video.title.cyan(), video.url);
    }
}

/// Print the link lists of a record after an edit.
fn report_links(edit: Result<BreadcrumbsFile, Error>) -> Result<(), Box<dyn std::error::Error>> {
    let record = edit?;
    info!("Saved breadcrumbs for {}", record.project_title);
    print_cards(&linked_cards(&record));
    print_videos(record.video_links.as_deref().unwrap_or_default());
    Ok(())
}

fn video_link(fields: VideoFields) -> VideoLink {
    VideoLink {
        url: fields.url,
        sprout_video_id: fields.sprout_video_id,
        title: fields.title,
        thumbnail_url: fields.thumbnail_url,
        upload_date: fields.upload_date,
        source_render_file: fields.source_render_file,
    }
}

fn run_card_add(config: &AppConfig, args: CardAddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let card_id = extract_card_id(&args.url)
        .ok_or_else(|| Error::InvalidCardUrl(args.url.clone()))?;

    let card = match (args.title, config.trello_credentials()) {
        (Some(title), _) => TrelloCard {
            title,
            ..placeholder_card(&args.url, card_id)
        },
        (None, Some(credentials)) => {
            let client = TrelloClient::new(credentials)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime
                .block_on(client.fetch_card_details(&args.url))
                .map_err(|err| format!("{:#}", err))?
        }
        (None, None) => {
            debug!("No card board credentials configured, storing card without details");
            placeholder_card(&args.url, card_id)
        }
    };

    report_links(links::associate_trello_card(&args.path, card))
}

/// Print the effective configuration as TOML, with credentials masked.
fn print_config(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut shown = config.clone();
    if let Some(trello) = shown.trello.as_mut() {
        trello.api_key = "***".to_string();
        trello.api_token = "***".to_string();
    }
    println!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
