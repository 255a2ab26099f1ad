// PathResolver - storage roots and save directory preparation
//
// The user's chosen directory is authoritative. Auto-discovery only suggests
// a starting value before anything has been chosen.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::errors::DownloadError;

/// Volume names under the storage base that never hold user downloads
pub const RESERVED_VOLUMES: &[&str] = &["emulated", "self", "knox"];

#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Parent of all mounted volumes (`/storage` on Android)
    pub storage_base: PathBuf,
    /// Primary internal volume
    pub internal_root: PathBuf,
    /// App-specific folder created under each `Download` directory
    pub app_dir_name: String,
    /// Desktop download directory, if the platform has one
    pub desktop_downloads: Option<PathBuf>,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            storage_base: PathBuf::from("/storage"),
            internal_root: PathBuf::from("/storage/emulated/0"),
            app_dir_name: "GhasabApp".to_string(),
            desktop_downloads: dirs::download_dir(),
        }
    }
}

impl StorageLayout {
    pub fn with_app_dir_name(mut self, name: impl Into<String>) -> Self {
        self.app_dir_name = name.into();
        self
    }

    pub fn internal_download_dir(&self) -> PathBuf {
        self.internal_root.join("Download")
    }

    /// External volumes, skipping reserved names. Unreadable base yields nothing.
    pub fn external_volumes(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.storage_base) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("storage base {} not readable: {}", self.storage_base.display(), e);
                return Vec::new();
            }
        };

        let mut volumes: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                !RESERVED_VOLUMES.contains(&name.as_ref())
            })
            .map(|entry| entry.path())
            .collect();
        volumes.sort();
        volumes
    }

    /// Conventional download directories, deduplicated, order preserved
    pub fn download_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.internal_download_dir(),
            self.internal_download_dir().join(&self.app_dir_name),
        ];

        for volume in self.external_volumes() {
            let download = volume.join("Download");
            dirs.push(download.clone());
            dirs.push(download.join(&self.app_dir_name));
        }

        if let Some(desktop) = &self.desktop_downloads {
            dirs.push(desktop.clone());
            dirs.push(desktop.join(&self.app_dir_name));
        }

        let mut seen = std::collections::HashSet::new();
        dirs.retain(|d| seen.insert(d.clone()));
        dirs
    }

    /// Suggested destination shown before the user picks one.
    /// External volumes first, then internal storage, then the desktop folder.
    /// Nothing is created here.
    pub fn suggest_save_dir(&self) -> PathBuf {
        if let Some(volume) = self.external_volumes().into_iter().next() {
            return volume.join("Download").join(&self.app_dir_name);
        }
        if self.internal_root.is_dir() {
            return self.internal_download_dir().join(&self.app_dir_name);
        }
        if let Some(desktop) = &self.desktop_downloads {
            return desktop.join(&self.app_dir_name);
        }
        PathBuf::from(".")
    }
}

/// Validates the user's directory and creates it when missing.
///
/// Empty input is `NoDestination`; a failed create (or a path that is a
/// regular file) is `Filesystem`. There is no fallback to a default path.
pub fn prepare_save_dir(user_dir: &str) -> Result<PathBuf, DownloadError> {
    let trimmed = user_dir.trim();
    if trimmed.is_empty() {
        return Err(DownloadError::NoDestination);
    }

    let path = PathBuf::from(trimmed);
    if path.is_dir() {
        return Ok(path);
    }

    if let Err(e) = std::fs::create_dir_all(&path) {
        warn!("failed to create save directory {}: {}", path.display(), e);
        return Err(DownloadError::filesystem(path, e));
    }
    debug!("created save directory {}", path.display());
    Ok(path)
}

/// `<dir>/%(title)s.%(ext)s`
pub fn output_template(save_dir: &Path) -> String {
    save_dir
        .join("%(title)s.%(ext)s")
        .to_string_lossy()
        .to_string()
}
