// Error types for the download pipeline

use std::path::PathBuf;
use thiserror::Error;

use super::models::ErrorCategory;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// No save directory was chosen
    #[error("no save directory selected")]
    NoDestination,

    /// Save directory could not be created or used
    #[error("cannot use directory {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// yt-dlp or another required tool is missing
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Malformed engine output or config file
    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Category shown to the user when no finer classification applies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoDestination => ErrorCategory::NoDestination,
            Self::Filesystem { .. } | Self::Io(_) => ErrorCategory::FilesystemError,
            Self::ToolNotFound(_) | Self::Parse(_) => ErrorCategory::Generic,
        }
    }

    /// Full diagnostic text for the detail view
    pub fn technical_detail(&self) -> String {
        match self {
            Self::Filesystem { path, source } => {
                format!("{:?} while preparing {}", source, path.display())
            }
            other => format!("{:?}", other),
        }
    }
}
