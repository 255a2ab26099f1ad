// Media engine trait definition and the job event emitter

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use super::models::{
    ActivityEntry, EngineFailure, EngineMetadata, EngineOptions, JobEvent, JobResult, JobState,
    LogLevel, RawProgress,
};
use super::progress::ProgressTracker;

/// Trait for the external media engine that does the actual fetching
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Fetch one URL. Progress goes through `emitter` while the call runs.
    async fn fetch(
        &self,
        url: &str,
        options: &EngineOptions,
        emitter: &ProgressEmitter,
    ) -> Result<EngineMetadata, EngineFailure>;
}

/// Publishes job events to one consumer. Raw engine progress passes through a
/// [`ProgressTracker`] first, so consumers only see normalized samples.
pub struct ProgressEmitter {
    tx: UnboundedSender<JobEvent>,
    tracker: Mutex<ProgressTracker>,
}

impl ProgressEmitter {
    pub fn new(tx: UnboundedSender<JobEvent>) -> Self {
        Self {
            tx,
            tracker: Mutex::new(ProgressTracker::new()),
        }
    }

    /// Emitter plus the receiving end of its event stream
    pub fn channel() -> (Self, UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn state(&self, state: JobState) {
        self.send(JobEvent::State(state));
    }

    /// One raw record from the engine
    pub fn raw(&self, raw: &RawProgress) {
        let sample = match self.tracker.lock() {
            Ok(mut tracker) => tracker.on_sample(raw),
            Err(_) => None,
        };
        if let Some(sample) = sample {
            self.send(JobEvent::Progress(sample));
        }
    }

    /// Every stream is on disk (post-processing may follow). Emits once per job.
    pub fn phase_finished(&self) {
        let sample = match self.tracker.lock() {
            Ok(mut tracker) => tracker.on_phase_finished(),
            Err(_) => None,
        };
        if let Some(sample) = sample {
            self.send(JobEvent::Progress(sample));
        }
    }

    /// Activity log line. Also goes to tracing.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warning => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        self.send(JobEvent::Log(ActivityEntry::new(level, message)));
    }

    pub fn finished(&self, result: JobResult) {
        self.send(JobEvent::Finished(result));
    }

    fn send(&self, event: JobEvent) {
        // A dropped receiver just means nobody is watching anymore
        let _ = self.tx.send(event);
    }
}
