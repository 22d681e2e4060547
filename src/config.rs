use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::scanner::ScanOptions;

/// Directory names the scanner never descends into.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    "vendor",
    "build",
    "dist",
    "target",
    ".cache",
    "tmp",
    "temp",
    "__pycache__",
];

pub const DEFAULT_APPLY_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub root_paths: Vec<String>,
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub scan: ScanOptions,
    #[serde(default = "default_apply_concurrency")]
    pub apply_concurrency: usize,
    #[serde(default)]
    pub trello: Option<TrelloCredentials>,
}

/// Credentials for the external card board. Propagation is skipped entirely without them.
#[derive(Clone, Serialize, Deserialize)]
pub struct TrelloCredentials {
    pub api_key: String,
    pub api_token: String,
}

impl std::fmt::Debug for TrelloCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrelloCredentials")
            .field("api_key", &"***")
            .field("api_token", &"***")
            .finish()
    }
}

impl TrelloCredentials {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_token.trim().is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            ignore_patterns: default_ignore_patterns(),
            scan: ScanOptions::default(),
            apply_concurrency: DEFAULT_APPLY_CONCURRENCY,
            trello: None,
        }
    }
}

impl AppConfig {
    /// Credentials that are present and non-blank.
    pub fn trello_credentials(&self) -> Option<&TrelloCredentials> {
        self.trello.as_ref().filter(|creds| creds.is_configured())
    }

    /// Configured roots with nested duplicates removed, so no tree is scanned twice.
    pub fn scan_roots(&self) -> Vec<String> {
        outermost_roots(&self.root_paths)
    }
}

/// Keep only roots that are not inside another root of the list. First occurrence wins.
pub fn outermost_roots(roots: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();

    for root in roots {
        let path = Path::new(root);
        if kept.iter().any(|k| path.starts_with(Path::new(k))) {
            continue;
        }
        kept.retain(|k| !Path::new(k).starts_with(path));
        kept.push(root.clone());
    }

    kept
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_apply_concurrency() -> usize {
    DEFAULT_APPLY_CONCURRENCY
}

/// Load `Config.toml` (optional) overlaid with `BAKER_*` environment variables,
/// e.g. `BAKER_SCAN__MAX_DEPTH=3` or `BAKER_TRELLO__API_KEY=...`.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_from("Config")
}

pub fn load_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(Environment::with_prefix("BAKER").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(dir.path().join("Absent").to_str().unwrap()).unwrap();
        assert_eq!(config.apply_concurrency, DEFAULT_APPLY_CONCURRENCY);
        assert_eq!(config.scan.max_depth, ScanOptions::default().max_depth);
        assert!(config.ignore_patterns.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Baker.toml");
        fs::write(
            &path,
            r#"
root_paths = ["/media/projects"]
apply_concurrency = 2

[scan]
max_depth = 5
include_hidden = true
create_missing = true
backup_originals = false

[trello]
api_key = "key"
api_token = "token"
"#,
        )
        .unwrap();

        let config = load_from(dir.path().join("Baker").to_str().unwrap()).unwrap();
        assert_eq!(config.root_paths, vec!["/media/projects".to_string()]);
        assert_eq!(config.apply_concurrency, 2);
        assert_eq!(config.scan.max_depth, 5);
        assert!(config.scan.include_hidden);
        assert!(config.scan.create_missing);
        assert!(!config.scan.backup_originals);
        assert!(config.trello_credentials().is_some());
    }

    #[test]
    fn test_nested_roots_are_collapsed() {
        let roots = vec![
            "/media/2024/Launch".to_string(),
            "/media/2024".to_string(),
            "/archive".to_string(),
            "/media/2024".to_string(),
        ];
        assert_eq!(
            outermost_roots(&roots),
            vec!["/media/2024".to_string(), "/archive".to_string()]
        );
    }

    #[test]
    fn test_blank_credentials_are_not_configured() {
        let config = AppConfig {
            trello: Some(TrelloCredentials {
                api_key: "  ".to_string(),
                api_token: "token".to_string(),
            }),
            ..AppConfig::default()
        };
        assert!(config.trello_credentials().is_none());
    }
}
