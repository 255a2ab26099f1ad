// Downloader module - orchestration core around the external media engine

pub mod cookies;
pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod paths;
pub mod platform;
pub mod progress;
pub mod renamer;
pub mod tools;
pub mod traits;
pub mod utils;

pub use cookies::CookieResolver;
pub use diagnostics::{Classification, ErrorClassifier};
pub use errors::DownloadError;
pub use format_selector::FormatSelector;
pub use models::{
    ActivityEntry, CookieCandidate, DownloadRequest, EngineFailure, EngineMetadata, EngineOptions,
    ErrorCategory, FormatPlan, JobEvent, JobResult, JobState, LogLevel, MediaMode, ProgressPhase,
    ProgressSample, Quality, RawProgress, RenameOutcome, RenameSkip,
};
pub use orchestrator::{DownloadOrchestrator, JobHandle};
pub use paths::{prepare_save_dir, StorageLayout};
pub use platform::GatedPlatform;
pub use progress::ProgressTracker;
pub use renamer::{sanitize_piece, Renamer};
pub use tools::{ToolInfo, ToolManager, ToolType};
pub use traits::{MediaEngine, ProgressEmitter};
