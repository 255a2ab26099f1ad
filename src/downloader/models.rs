// Common data models for the download pipeline

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use time::OffsetDateTime;

/// What the user wants out of the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaMode {
    #[default]
    Video,
    Audio,
}

impl fmt::Display for MediaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Upper bound on video height. Ignored in audio mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    Best,
    P1080,
    P720,
    P480,
    P360,
}

impl Quality {
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::Best => None,
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best" => Ok(Self::Best),
            "1080p" | "1080" => Ok(Self::P1080),
            "720p" | "720" => Ok(Self::P720),
            "480p" | "480" => Ok(Self::P480),
            "360p" | "360" => Ok(Self::P360),
            other => Err(format!(
                "unknown quality '{}' (expected best, 1080p, 720p, 480p or 360p)",
                other
            )),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_height() {
            Some(h) => write!(f, "{}p", h),
            None => write!(f, "best"),
        }
    }
}

/// One download submission. Immutable once handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub mode: MediaMode,
    pub quality: Quality,
    /// Destination chosen by the user. May be empty, which fails validation.
    pub save_dir: String,
    /// Cookie file picked explicitly by the user
    pub explicit_cookie_path: Option<PathBuf>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, mode: MediaMode, save_dir: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode,
            quality: Quality::Best,
            save_dir: save_dir.into(),
            explicit_cookie_path: None,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_cookie_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_cookie_path = path;
        self
    }
}

/// A cookie file found on disk. Lower rank wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieCandidate {
    pub path: PathBuf,
    pub rank: u8,
}

impl CookieCandidate {
    fn sort_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

impl Ord for CookieCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.sort_name().cmp(&other.sort_name()))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for CookieCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Format expression handed to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatPlan {
    pub expression: String,
    /// Container for merged video+audio output; unset when nothing gets merged
    pub merge_container: Option<String>,
    /// Set when the plan had to settle for lower quality
    pub quality_warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressPhase {
    Downloading,
    /// File is on disk; the engine may still be merging/post-processing
    Finishing,
}

/// Raw progress record as the engine reports it. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawProgress {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub eta: Option<f64>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Normalized progress snapshot. Superseded by the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    pub downloaded_bytes: u64,
    /// 0 when the size is unknown
    pub total_bytes: u64,
    pub speed_bytes_per_sec: f64,
    pub eta_seconds: Option<u64>,
    pub phase: ProgressPhase,
    pub filename: Option<PathBuf>,
}

/// Options the engine receives for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub output_template: String,
    pub format_expression: String,
    pub merge_container: Option<String>,
    pub cookie_file: Option<PathBuf>,
    /// Explicit merge tool location
    pub ffmpeg_location: Option<PathBuf>,
}

/// Final metadata the engine returns on success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub filepath: Option<PathBuf>,
}

impl EngineMetadata {
    /// Uploader is preferred, channel is the fallback
    pub fn channel_name(&self) -> Option<&str> {
        self.uploader
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.channel.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// Engine failure payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    /// Human-readable failure text
    pub message: String,
    /// Full diagnostic trace for the detail view
    pub detail: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Why the post-download rename did not happen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RenameSkip {
    /// Engine reported no usable path (restricted storage)
    PathUnavailable,
    FileMissing(PathBuf),
    DirectoryNotWritable(PathBuf),
    Failed(String),
}

impl fmt::Display for RenameSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathUnavailable => write!(f, "path unavailable"),
            Self::FileMissing(p) => write!(f, "file missing: {}", p.display()),
            Self::DirectoryNotWritable(p) => {
                write!(f, "directory not writable: {}", p.display())
            }
            Self::Failed(e) => write!(f, "rename failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub final_path: Option<PathBuf>,
    pub renamed: bool,
    pub skip_reason: Option<RenameSkip>,
}

impl RenameOutcome {
    pub fn renamed(path: PathBuf) -> Self {
        Self {
            final_path: Some(path),
            renamed: true,
            skip_reason: None,
        }
    }

    pub fn unchanged(path: PathBuf) -> Self {
        Self {
            final_path: Some(path),
            renamed: false,
            skip_reason: None,
        }
    }

    pub fn skipped(path: Option<PathBuf>, reason: RenameSkip) -> Self {
        Self {
            final_path: path,
            renamed: false,
            skip_reason: Some(reason),
        }
    }
}

/// User-facing failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    NoDestination,
    FilesystemError,
    BlockedNeedsCookies,
    StillBlockedWithCookies,
    Generic,
    /// Non-fatal, only ever logged
    RenameSkipped,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoDestination => "no destination",
            Self::FilesystemError => "filesystem error",
            Self::BlockedNeedsCookies => "blocked, cookies needed",
            Self::StillBlockedWithCookies => "blocked despite cookies",
            Self::Generic => "download failed",
            Self::RenameSkipped => "rename skipped",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    Validating,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Terminal outcome of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub succeeded: bool,
    /// Media title on success, the URL on failure
    pub final_title: String,
    pub final_path: Option<PathBuf>,
    pub error_category: Option<ErrorCategory>,
    /// Friendly, actionable message
    pub user_message: Option<String>,
    pub raw_error: Option<String>,
    pub technical_detail: Option<String>,
    pub rename: Option<RenameOutcome>,
}

impl JobResult {
    pub fn success(title: String, final_path: Option<PathBuf>, rename: RenameOutcome) -> Self {
        Self {
            succeeded: true,
            final_title: title,
            final_path,
            error_category: None,
            user_message: None,
            raw_error: None,
            technical_detail: None,
            rename: Some(rename),
        }
    }

    pub fn failure(
        url: &str,
        category: ErrorCategory,
        user_message: String,
        raw_error: String,
        technical_detail: String,
    ) -> Self {
        Self {
            succeeded: false,
            final_title: url.to_string(),
            final_path: None,
            error_category: Some(category),
            user_message: Some(user_message),
            raw_error: Some(raw_error),
            technical_detail: Some(technical_detail),
            rename: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One line of the per-job activity log
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub at: OffsetDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl ActivityEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            level,
            message: message.into(),
        }
    }
}

/// Everything a job publishes to its consumer. `Finished` is always last.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    State(JobState),
    Progress(ProgressSample),
    Log(ActivityEntry),
    Finished(JobResult),
}
