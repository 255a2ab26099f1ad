// Application configuration: JSON file plus environment overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::paths::StorageLayout;

pub const APP_NAME: &str = "media-downloader";
const CONFIG_FILE: &str = "config.json";

pub const ENV_FFMPEG: &str = "FFMPEG_EXEC_PATH";
pub const ENV_YTDLP: &str = "YTDLP_PATH";
pub const ENV_SAVE_DIR: &str = "MEDIA_DOWNLOADER_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default destination when none is given on the command line
    pub save_dir: Option<PathBuf>,
    /// Cookie file passed to every download
    pub cookie_file: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    /// Folder created under each `Download` directory
    pub app_dir_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            cookie_file: None,
            ytdlp_path: None,
            ffmpeg_path: None,
            app_dir_name: "GhasabApp".to_string(),
        }
    }
}

impl AppConfig {
    /// `<config_dir>/media-downloader/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Config file (if any) with environment overrides applied
    pub fn load() -> Result<Self, DownloadError> {
        let config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        Ok(config.apply_env_with(|key| std::env::var(key).ok()))
    }

    /// Missing file gives defaults; unreadable or malformed file is an error
    pub fn load_from(path: &Path) -> Result<Self, DownloadError> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| DownloadError::filesystem(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| DownloadError::Parse(format!("{}: {}", path.display(), e)))
    }

    pub fn apply_env_with<F>(mut self, get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(value) = non_empty(ENV_FFMPEG) {
            let path = PathBuf::from(value);
            if path.is_file() {
                self.ffmpeg_path = Some(path);
            } else {
                warn!("{} points to {}, which is not a file; ignoring", ENV_FFMPEG, path.display());
            }
        }
        if let Some(value) = non_empty(ENV_YTDLP) {
            self.ytdlp_path = Some(PathBuf::from(value));
        }
        if let Some(value) = non_empty(ENV_SAVE_DIR) {
            self.save_dir = Some(PathBuf::from(value));
        }
        self
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::default().with_app_dir_name(self.app_dir_name.clone())
    }
}
