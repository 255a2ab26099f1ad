// DownloadOrchestrator - one end-to-end job per request
//
// Idle -> Validating -> Running -> Succeeded | Failed
//
// Destination problems abort before the engine is touched. Engine failures
// are classified but the raw text and full trace always travel with the
// result. A rename problem never fails a job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::cookies::CookieResolver;
use super::diagnostics::ErrorClassifier;
use super::errors::DownloadError;
use super::format_selector::FormatSelector;
use super::models::{
    DownloadRequest, EngineMetadata, EngineOptions, ErrorCategory, JobEvent, JobResult, JobState,
    LogLevel,
};
use super::paths::{output_template, prepare_save_dir, StorageLayout};
use super::platform::GatedPlatform;
use super::renamer::Renamer;
use super::traits::{MediaEngine, ProgressEmitter};

pub struct DownloadOrchestrator {
    engine: Arc<dyn MediaEngine>,
    ffmpeg: Option<PathBuf>,
    layout: StorageLayout,
    platform: GatedPlatform,
    renamer: Renamer,
}

impl DownloadOrchestrator {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            ffmpeg: None,
            layout: StorageLayout::default(),
            platform: GatedPlatform::default(),
            renamer: Renamer::new(),
        }
    }

    /// Merge tool location. `None` means video falls back to pre-muxed streams.
    pub fn with_ffmpeg(mut self, ffmpeg: Option<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg;
        self
    }

    pub fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Starts the job on its own tokio task and returns its event stream
    pub fn submit(self: &Arc<Self>, request: DownloadRequest) -> JobHandle {
        let (emitter, rx) = ProgressEmitter::channel();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run(request, &emitter).await });
        JobHandle { rx, task }
    }

    /// Runs the job in place. Every event, `Finished` last, goes to `emitter`.
    pub async fn run(&self, request: DownloadRequest, emitter: &ProgressEmitter) -> JobResult {
        emitter.state(JobState::Idle);
        let result = self.execute(&request, emitter).await;
        emitter.state(if result.succeeded {
            JobState::Succeeded
        } else {
            JobState::Failed
        });
        emitter.finished(result.clone());
        result
    }

    async fn execute(&self, request: &DownloadRequest, emitter: &ProgressEmitter) -> JobResult {
        emitter.state(JobState::Validating);
        let save_dir = match prepare_save_dir(&request.save_dir) {
            Ok(dir) => dir,
            Err(e) => return self.abort(request, e, emitter),
        };

        emitter.state(JobState::Running);
        let plan = FormatSelector::select_with_quality(
            request.mode,
            request.quality,
            self.ffmpeg.is_some(),
        );
        if let Some(warning) = &plan.quality_warning {
            emitter.log(LogLevel::Warning, warning.clone());
        }

        let cookie_file = self.resolve_cookies(request, &save_dir);
        match &cookie_file {
            Some(path) => emitter.log(
                LogLevel::Info,
                format!("Using cookie file: {}", path.display()),
            ),
            None if self.platform.matches_url(&request.url) => emitter.log(
                LogLevel::Warning,
                format!(
                    "No {} cookie file found; restricted posts may fail",
                    self.platform.name
                ),
            ),
            None => {}
        }

        let options = EngineOptions {
            output_template: output_template(&save_dir),
            format_expression: plan.expression,
            merge_container: plan.merge_container,
            cookie_file: cookie_file.clone(),
            ffmpeg_location: self.ffmpeg.clone(),
        };
        debug!("engine options: {:?}", options);
        emitter.log(
            LogLevel::Info,
            format!(
                "Starting {} download of {} with {}",
                request.mode,
                request.url,
                self.engine.name()
            ),
        );

        match self.engine.fetch(&request.url, &options, emitter).await {
            Ok(meta) => self.complete(request, meta, emitter),
            Err(failure) => {
                let classification =
                    ErrorClassifier::new(self.platform.clone(), self.layout.app_dir_name.clone())
                        .classify(&failure.message, &request.url, cookie_file.as_deref());
                emitter.log(LogLevel::Error, classification.user_message.clone());
                JobResult::failure(
                    &request.url,
                    classification.category,
                    classification.user_message,
                    failure.message,
                    failure.detail,
                )
            }
        }
    }

    fn complete(
        &self,
        request: &DownloadRequest,
        meta: EngineMetadata,
        emitter: &ProgressEmitter,
    ) -> JobResult {
        // No-op when the engine already reported post-processing
        emitter.phase_finished();

        let outcome = self.renamer.rename(
            meta.filepath.as_deref(),
            meta.title.as_deref(),
            meta.channel_name(),
        );
        if let Some(reason) = &outcome.skip_reason {
            emitter.log(
                LogLevel::Warning,
                format!("{}: {}", ErrorCategory::RenameSkipped, reason),
            );
        }

        let final_path = outcome.final_path.clone();
        let title = display_title(&meta, final_path.as_deref(), &request.url);
        emitter.log(LogLevel::Info, format!("Download complete: {}", title));
        if let Some(path) = &final_path {
            info!("saved to {}", path.display());
        }
        JobResult::success(title, final_path, outcome)
    }

    /// Explicit file applies to every URL; discovery only for the gated platform
    fn resolve_cookies(&self, request: &DownloadRequest, save_dir: &Path) -> Option<PathBuf> {
        let explicit = request.explicit_cookie_path.as_deref();
        if self.platform.matches_url(&request.url) {
            let resolver = CookieResolver::new(self.layout.clone(), self.platform.clone());
            return resolver.resolve(explicit, save_dir);
        }
        explicit.filter(|p| p.is_file()).map(Path::to_path_buf)
    }

    fn abort(
        &self,
        request: &DownloadRequest,
        error: DownloadError,
        emitter: &ProgressEmitter,
    ) -> JobResult {
        let user_message = match &error {
            DownloadError::NoDestination => "Choose a folder to save into first.".to_string(),
            DownloadError::Filesystem { path, .. } => format!(
                "Cannot create or write to {}. Pick another folder or check storage permissions.",
                path.display()
            ),
            other => other.to_string(),
        };
        emitter.log(LogLevel::Error, user_message.clone());
        JobResult::failure(
            &request.url,
            error.category(),
            user_message,
            error.to_string(),
            error.technical_detail(),
        )
    }
}

fn display_title(meta: &EngineMetadata, final_path: Option<&Path>, url: &str) -> String {
    if let Some(title) = meta.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }
    final_path
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string())
}

/// Consumer side of a submitted job
pub struct JobHandle {
    rx: UnboundedReceiver<JobEvent>,
    task: JoinHandle<JobResult>,
}

impl JobHandle {
    /// Next event; `None` once the stream has ended after `Finished`
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }

    /// Drains the stream and returns the terminal result
    pub async fn wait(mut self) -> Option<JobResult> {
        while let Some(event) = self.rx.recv().await {
            if let JobEvent::Finished(result) = event {
                return Some(result);
            }
        }
        self.task.await.ok()
    }
}
