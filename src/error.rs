use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Root path {path}: {reason}")]
    RootPath { path: String, reason: String },

    #[error("Project paths cannot be empty")]
    EmptySelection,

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("No breadcrumbs file found in {0}")]
    NoBreadcrumbs(String),

    #[error("{reason}")]
    UnreadableBreadcrumbs { kind: ErrorKind, reason: String },

    #[error("Maximum of {limit} {what} per project reached")]
    LimitReached { what: &'static str, limit: usize },

    #[error("{what} index {index} out of bounds (have {len})")]
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Card {0} is already associated with the project")]
    DuplicateCard(String),

    #[error("Invalid card URL: {0}")]
    InvalidCardUrl(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Where this error falls in the per-item failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(err) => ErrorKind::from_io(err),
            Error::Json(_) => ErrorKind::Corruption,
            Error::UnreadableBreadcrumbs { kind, .. } => *kind,
            _ => ErrorKind::Filesystem,
        }
    }
}

/// Failure taxonomy shared by scan errors, batch apply failures and card sync failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Permission,
    Structure,
    Filesystem,
    Corruption,
}

impl ErrorKind {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            _ => ErrorKind::Filesystem,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Permission => "permission",
            ErrorKind::Structure => "structure",
            ErrorKind::Filesystem => "filesystem",
            ErrorKind::Corruption => "corruption",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_maps_to_permission() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(ErrorKind::from_io(&err), ErrorKind::Permission);

        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(ErrorKind::from_io(&err), ErrorKind::Filesystem);
    }

    #[test]
    fn test_error_kind_of_crate_errors() {
        let err = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Filesystem);
        let err = Error::UnreadableBreadcrumbs {
            kind: ErrorKind::Corruption,
            reason: "bad".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ErrorKind::Corruption).unwrap();
        assert_eq!(json, "\"corruption\"");
    }
}
