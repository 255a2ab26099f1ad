// Tool detection - locates yt-dlp and ffmpeg and reads their versions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::utils::run_output_with_timeout;

const VERSION_TIMEOUT_SECS: u64 = 10;
const LOOKUP_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn binary_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

/// Finds external tools: explicit override, then common locations, then PATH.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_override: Option<PathBuf>,
    ffmpeg_override: Option<PathBuf>,
}

impl ToolManager {
    pub fn new(ytdlp_override: Option<PathBuf>, ffmpeg_override: Option<PathBuf>) -> Self {
        Self {
            ytdlp_override,
            ffmpeg_override,
        }
    }

    pub async fn locate(&self, tool_type: ToolType) -> Option<PathBuf> {
        let override_path = match tool_type {
            ToolType::YtDlp => self.ytdlp_override.as_ref(),
            ToolType::Ffmpeg => self.ffmpeg_override.as_ref(),
        };

        // 1. Explicit override wins if it is a real file
        if let Some(path) = override_path {
            if path.is_file() {
                return Some(path.clone());
            }
            warn!(
                "{} override {} is not a file, searching the system instead",
                tool_type.as_str(),
                path.display()
            );
        }

        let binary_name = tool_type.binary_name();

        // 2. Common install locations
        let common_dirs = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];
        for dir in common_dirs {
            let path = Path::new(dir).join(&binary_name);
            if path.is_file() {
                return Some(path);
            }
        }

        // 3. PATH lookup
        let finder = Path::new(if cfg!(windows) { "where" } else { "which" });
        let args = [binary_name.as_str()];
        if let Ok(output) = run_output_with_timeout(finder, &args, LOOKUP_TIMEOUT_SECS).await {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Some(first) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                    return Some(PathBuf::from(first));
                }
            }
        }

        debug!("{} not found", tool_type.as_str());
        None
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type).await;
        let version = match &path {
            Some(p) => self.get_version(p, tool_type).await,
            None => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }

    async fn get_version(&self, path: &Path, tool_type: ToolType) -> Option<String> {
        let args = [tool_type.version_arg()];
        match run_output_with_timeout(path, &args, VERSION_TIMEOUT_SECS).await {
            Ok(output) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout);
                out.lines().next().map(|l| l.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                debug!("{} version check failed: {}", tool_type.as_str(), e);
                None
            }
        }
    }
}
