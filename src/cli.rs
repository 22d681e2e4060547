use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "baker")]
#[command(about = "Reconcile breadcrumbs across video project folders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a root folder (or the configured roots) for projects
    Scan(ScanArgs),
    /// Show what a batch apply would change
    Preview(ProjectArgs),
    /// Write reconciled breadcrumbs to the given projects, then sync linked cards
    Apply(ApplyArgs),
    /// Check one folder against the project skeleton
    Validate(PathArg),
    /// List the footage files currently on disk for a project
    Files(PathArg),
    /// List the cards linked from a project's breadcrumbs
    Cards(PathArg),
    /// Link a card to a project
    CardAdd(CardAddArgs),
    /// Unlink the card at a position shown by `cards`
    CardRemove(IndexArgs),
    /// List the video links of a project
    Videos(PathArg),
    /// Link a video to a project
    VideoAdd(VideoAddArgs),
    /// Replace the video link at a position shown by `videos`
    VideoUpdate(VideoUpdateArgs),
    /// Unlink the video at a position shown by `videos`
    VideoRemove(IndexArgs),
    /// Move a video link to another position
    VideoMove(MoveArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Root folder; defaults to `root_paths` from the configuration
    pub root: Option<PathBuf>,
    /// Override the configured maximum depth
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Descend into hidden folders
    #[arg(long)]
    pub include_hidden: bool,
    /// Print the full scan result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Project folders
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Project folders
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Create breadcrumbs for projects that have none
    #[arg(long)]
    pub create_missing: bool,
    /// Force a `.bak` copy before overwriting, whatever the configuration says
    #[arg(long)]
    pub backup: bool,
    /// Skip the card sync after writing
    #[arg(long)]
    pub no_sync: bool,
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct PathArg {
    pub path: PathBuf,
}

#[derive(Debug, Args)]
pub struct CardAddArgs {
    pub path: PathBuf,
    /// Card URL (https://trello.com/c/<id>/...)
    pub url: String,
    /// Title to store; fetched from the board when omitted and credentials are set
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    pub path: PathBuf,
    /// Zero-based position
    pub index: usize,
}

#[derive(Debug, Args)]
pub struct VideoFields {
    pub url: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub sprout_video_id: Option<String>,
    #[arg(long)]
    pub thumbnail_url: Option<String>,
    #[arg(long)]
    pub upload_date: Option<String>,
    #[arg(long)]
    pub source_render_file: Option<String>,
}

#[derive(Debug, Args)]
pub struct VideoAddArgs {
    pub path: PathBuf,
    #[command(flatten)]
    pub video: VideoFields,
}

#[derive(Debug, Args)]
pub struct VideoUpdateArgs {
    pub path: PathBuf,
    pub index: usize,
    #[command(flatten)]
    pub video: VideoFields,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    pub path: PathBuf,
    pub from: usize,
    pub to: usize,
}
