// End-to-end job scenarios against a scripted engine

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use media_downloader_lib::downloader::{
    DownloadOrchestrator, DownloadRequest, EngineFailure, EngineMetadata, EngineOptions,
    ErrorCategory, JobEvent, JobResult, JobState, LogLevel, MediaEngine, MediaMode,
    ProgressEmitter, ProgressPhase, ProgressSample, RawProgress, RenameSkip, StorageLayout,
};

const IG_URL: &str = "https://www.instagram.com/reel/Cxyz987/";

enum Script {
    /// Writes this file into the save dir and succeeds
    Produce(&'static str),
    /// Downloads a video and an audio stream, merges them, then succeeds
    Merge(&'static str),
    /// Reports this file but never writes it
    Vanish(&'static str),
    Fail(&'static str),
}

struct FakeEngine {
    script: Script,
    calls: AtomicUsize,
    seen: Mutex<Option<EngineOptions>>,
}

impl FakeEngine {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        })
    }

    fn options(&self) -> EngineOptions {
        self.seen.lock().unwrap().clone().expect("engine was not called")
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch(
        &self,
        _url: &str,
        options: &EngineOptions,
        emitter: &ProgressEmitter,
    ) -> Result<EngineMetadata, EngineFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(options.clone());

        match &self.script {
            Script::Produce(name) => {
                let dir = options.output_template.trim_end_matches("%(title)s.%(ext)s");
                let path = PathBuf::from(dir).join(name);
                let file = path.to_string_lossy().to_string();
                for done in [0.0, 400.0, 1000.0] {
                    emitter.raw(&RawProgress {
                        status: "downloading".into(),
                        downloaded_bytes: Some(done),
                        total_bytes: Some(1000.0),
                        speed: Some(1024.0),
                        eta: Some(1.0),
                        filename: Some(file.clone()),
                        ..Default::default()
                    });
                }
                std::fs::write(&path, vec![0u8; 1000]).unwrap();
                emitter.raw(&RawProgress {
                    status: "finished".into(),
                    filename: Some(file),
                    ..Default::default()
                });
                Ok(EngineMetadata {
                    title: Some("Morning Walk".into()),
                    uploader: Some("Trail Cams".into()),
                    channel: None,
                    filepath: Some(path),
                })
            }
            Script::Merge(name) => {
                let dir = options.output_template.trim_end_matches("%(title)s.%(ext)s");
                let path = PathBuf::from(dir).join(name);
                for (stream, total) in [("Clip.f137.mp4", 3000.0), ("Clip.f140.m4a", 500.0)] {
                    let file = PathBuf::from(dir).join(stream).to_string_lossy().to_string();
                    for done in [0.0, total / 2.0, total] {
                        emitter.raw(&RawProgress {
                            status: "downloading".into(),
                            downloaded_bytes: Some(done),
                            total_bytes: Some(total),
                            filename: Some(file.clone()),
                            ..Default::default()
                        });
                    }
                    emitter.raw(&RawProgress {
                        status: "finished".into(),
                        filename: Some(file),
                        ..Default::default()
                    });
                }
                emitter.phase_finished();
                std::fs::write(&path, vec![0u8; 3500]).unwrap();
                Ok(EngineMetadata {
                    title: Some("Clip".into()),
                    uploader: None,
                    channel: Some("Chan".into()),
                    filepath: Some(path),
                })
            }
            Script::Vanish(name) => {
                let dir = options.output_template.trim_end_matches("%(title)s.%(ext)s");
                Ok(EngineMetadata {
                    title: Some("Gone".into()),
                    uploader: Some("Nobody".into()),
                    channel: None,
                    filepath: Some(PathBuf::from(dir).join(name)),
                })
            }
            Script::Fail(stderr) => Err(EngineFailure::new(
                *stderr,
                format!("exit status: 1\n\n--- stderr ---\n{}", stderr),
            )),
        }
    }
}

/// Layout rooted in a temp dir so no real storage is scanned
fn layout(root: &Path) -> StorageLayout {
    let internal = root.join("storage/emulated/0");
    std::fs::create_dir_all(internal.join("Download")).unwrap();
    StorageLayout {
        storage_base: root.join("storage"),
        internal_root: internal,
        app_dir_name: "GhasabApp".into(),
        desktop_downloads: None,
    }
}

async fn run_job(
    engine: Arc<FakeEngine>,
    root: &Path,
    request: DownloadRequest,
) -> (Vec<JobEvent>, JobResult) {
    let orchestrator = Arc::new(DownloadOrchestrator::new(engine).with_layout(layout(root)));
    let mut handle = orchestrator.submit(request);
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    let result = match events.last() {
        Some(JobEvent::Finished(r)) => r.clone(),
        other => panic!("stream must end with Finished, got {:?}", other),
    };
    (events, result)
}

fn states(events: &[JobEvent]) -> Vec<JobState> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_gated_link_without_cookies_needs_cookies() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Script::Fail(
        "ERROR: [Instagram] Cxyz987: This content may be inappropriate: \
         It's unavailable for certain audiences.",
    ));
    let save = tmp.path().join("out");
    let request = DownloadRequest::new(IG_URL, MediaMode::Video, save.to_string_lossy());

    let (events, result) = run_job(engine.clone(), tmp.path(), request).await;

    assert!(!result.succeeded);
    assert_eq!(result.error_category, Some(ErrorCategory::BlockedNeedsCookies));
    let message = result.user_message.unwrap();
    assert!(message.contains("cookie"));
    assert!(message.contains("instagram_cookies.txt"));
    assert!(result.raw_error.unwrap().contains("unavailable for certain audiences"));
    assert!(result.technical_detail.unwrap().contains("--- stderr ---"));
    assert_eq!(engine.options().cookie_file, None);
    assert_eq!(
        states(&events),
        vec![JobState::Idle, JobState::Validating, JobState::Running, JobState::Failed]
    );
}

#[tokio::test]
async fn test_gated_link_with_discovered_cookie_still_blocked() {
    let tmp = tempfile::tempdir().unwrap();
    let save = tmp.path().join("out");
    std::fs::create_dir_all(&save).unwrap();
    let download = tmp.path().join("storage/emulated/0/Download");
    std::fs::create_dir_all(&download).unwrap();
    std::fs::write(download.join("cookies.txt"), b"# Netscape HTTP Cookie File\n").unwrap();
    std::fs::write(save.join("instagram_cookies.txt"), b"# Netscape HTTP Cookie File\n").unwrap();

    let engine = FakeEngine::new(Script::Fail("ERROR: [Instagram] Cxyz987: Login required"));
    let request = DownloadRequest::new(IG_URL, MediaMode::Video, save.to_string_lossy());
    let (_, result) = run_job(engine.clone(), tmp.path(), request).await;

    let used = save.join("instagram_cookies.txt");
    assert_eq!(engine.options().cookie_file, Some(used.clone()));
    assert_eq!(result.error_category, Some(ErrorCategory::StillBlockedWithCookies));
    assert!(result.user_message.unwrap().contains(&used.display().to_string()));
}

fn samples(events: &[JobEvent]) -> Vec<ProgressSample> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

fn warnings(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Log(entry) if entry.level == LogLevel::Warning => Some(entry.message.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_audio_download_succeeds_and_renames() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Script::Produce("Morning Walk.m4a"));
    let save = tmp.path().join("out");
    let request = DownloadRequest::new(
        "https://example.com/watch?v=1",
        MediaMode::Audio,
        save.to_string_lossy(),
    );

    let (events, result) = run_job(engine.clone(), tmp.path(), request).await;

    let options = engine.options();
    assert_eq!(options.format_expression, "bestaudio/best");
    assert_eq!(options.merge_container, None);
    assert_eq!(
        states(&events),
        vec![
            JobState::Idle,
            JobState::Validating,
            JobState::Running,
            JobState::Succeeded
        ]
    );

    assert!(result.succeeded);
    assert_eq!(result.final_title, "Morning Walk");
    let expected = save.join("Trail Cams - Morning Walk.m4a");
    assert_eq!(result.final_path, Some(expected.clone()));
    assert!(expected.is_file());
    let rename = result.rename.unwrap();
    assert!(rename.renamed);
    assert_eq!(rename.skip_reason, None);

    // progress never goes backwards and finishes exactly once
    let samples = samples(&events);
    assert!(samples
        .windows(2)
        .all(|w| w[0].downloaded_bytes <= w[1].downloaded_bytes));
    let finishing = samples
        .iter()
        .filter(|s| s.phase == ProgressPhase::Finishing)
        .count();
    assert_eq!(finishing, 1);
    assert_eq!(samples.last().map(|s| s.phase), Some(ProgressPhase::Finishing));
}

#[tokio::test]
async fn test_empty_save_dir_fails_before_engine() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Script::Produce("x.mp4"));
    let request = DownloadRequest::new("https://example.com/v", MediaMode::Video, "");

    let (events, result) = run_job(engine.clone(), tmp.path(), request).await;

    assert!(!result.succeeded);
    assert_eq!(result.error_category, Some(ErrorCategory::NoDestination));
    assert!(result.user_message.is_some());
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        states(&events),
        vec![JobState::Idle, JobState::Validating, JobState::Failed]
    );
}

#[tokio::test]
async fn test_merged_streams_progress_is_job_level() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Script::Merge("Clip.mp4"));
    let save = tmp.path().join("out");
    let request = DownloadRequest::new(
        "https://example.com/watch?v=2",
        MediaMode::Video,
        save.to_string_lossy(),
    );

    let (events, result) = run_job(engine, tmp.path(), request).await;
    assert!(result.succeeded);
    assert_eq!(result.final_path, Some(save.join("Chan - Clip.mp4")));

    let samples = samples(&events);
    assert!(samples
        .windows(2)
        .all(|w| w[0].downloaded_bytes <= w[1].downloaded_bytes));
    let finishing: Vec<_> = samples
        .iter()
        .filter(|s| s.phase == ProgressPhase::Finishing)
        .collect();
    assert_eq!(finishing.len(), 1);
    assert_eq!(finishing[0].downloaded_bytes, 3500);
    assert_eq!(samples.last().map(|s| s.phase), Some(ProgressPhase::Finishing));
}

#[tokio::test]
async fn test_missing_output_still_succeeds_with_warning() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(Script::Vanish("Gone.mp4"));
    let save = tmp.path().join("out");
    let request = DownloadRequest::new(
        "https://example.com/watch?v=3",
        MediaMode::Audio,
        save.to_string_lossy(),
    );

    let (events, result) = run_job(engine, tmp.path(), request).await;

    assert!(result.succeeded);
    assert_eq!(result.error_category, None);
    let rename = result.rename.unwrap();
    assert!(!rename.renamed);
    assert!(rename.skip_reason.is_some());
    assert_eq!(states(&events).last(), Some(&JobState::Succeeded));
    let warnings = warnings(&events);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].to_lowercase().contains("rename skipped"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_read_only_save_dir_still_succeeds_with_warning() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir().unwrap();
    let save = tmp.path().join("out");
    std::fs::create_dir_all(&save).unwrap();
    let file = save.join("Locked.mp4");
    std::fs::write(&file, b"data").unwrap();
    std::fs::set_permissions(&save, std::fs::Permissions::from_mode(0o555)).unwrap();

    let engine = FakeEngine::new(Script::Vanish("Locked.mp4"));
    let request = DownloadRequest::new(
        "https://example.com/watch?v=4",
        MediaMode::Audio,
        save.to_string_lossy(),
    );
    let (events, result) = run_job(engine, tmp.path(), request).await;
    std::fs::set_permissions(&save, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert!(result.succeeded);
    let rename = result.rename.unwrap();
    assert!(!rename.renamed);
    assert!(matches!(rename.skip_reason, Some(RenameSkip::DirectoryNotWritable(_))));
    assert_eq!(result.final_path, Some(file.clone()));
    assert!(file.is_file());
    assert_eq!(warnings(&events).len(), 1);
}
