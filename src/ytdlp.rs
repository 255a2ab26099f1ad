// yt-dlp engine adapter
//
// Progress, post-processing and final metadata come back as JSON on stdout,
// tagged with our own prefixes so they can't be confused with regular yt-dlp
// chatter. `--print` implies quiet mode, so nothing else is relied upon.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{
    EngineFailure, EngineMetadata, EngineOptions, LogLevel, RawProgress,
};
use crate::downloader::traits::{MediaEngine, ProgressEmitter};
use crate::downloader::utils::tail_lines;

const PROGRESS_PREFIX: &str = "[mdl-progress]";
const PROGRESS_FIELDS: &str =
    "status,downloaded_bytes,total_bytes,total_bytes_estimate,speed,eta,filename";
const POST_PREFIX: &str = "[mdl-post]";
const META_PREFIX: &str = "[mdl-meta]";

/// Post-processors that only run once every stream is on disk
const AFTER_DOWNLOAD_PPS: &[&str] = &["Merger", "MoveFiles"];

/// Post-processor hook record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPostProcess {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub postprocessor: String,
}

impl RawPostProcess {
    /// The download phase is over once one of these starts
    pub fn ends_download(&self) -> bool {
        self.status == "started" && AFTER_DOWNLOAD_PPS.contains(&self.postprocessor.as_str())
    }
}

/// One stdout line, classified
#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine {
    Progress(RawProgress),
    PostProcess(RawPostProcess),
    Metadata(EngineMetadata),
    Other,
}

pub fn parse_line(line: &str) -> EngineLine {
    let line = line.trim();
    if let Some(json) = line.strip_prefix(PROGRESS_PREFIX) {
        return match serde_json::from_str::<RawProgress>(json) {
            Ok(raw) => EngineLine::Progress(raw),
            Err(e) => {
                debug!("unparseable progress line ({}): {}", e, json);
                EngineLine::Other
            }
        };
    }
    if let Some(json) = line.strip_prefix(META_PREFIX) {
        return match serde_json::from_str::<EngineMetadata>(json) {
            Ok(meta) => EngineLine::Metadata(meta),
            Err(e) => {
                warn!("unparseable metadata line ({}): {}", e, json);
                EngineLine::Other
            }
        };
    }
    if let Some(json) = line.strip_prefix(POST_PREFIX) {
        return match serde_json::from_str::<RawPostProcess>(json) {
            Ok(pp) => EngineLine::PostProcess(pp),
            Err(e) => {
                debug!("unparseable postprocess line ({}): {}", e, json);
                EngineLine::Other
            }
        };
    }
    EngineLine::Other
}

/// Next line with invalid UTF-8 replaced. `None` at end of stream or on a read
/// error; a badly encoded line never stops the reader.
pub async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(buf);
            Some(line.trim_end_matches(['\r', '\n']).to_string())
        }
        Err(e) => {
            warn!("reading yt-dlp output failed: {}", e);
            None
        }
    }
}

/// `ERROR:` lines of stderr, or its last line when there are none
pub fn failure_message(stderr: &str) -> Option<String> {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return Some(errors.join("\n"));
    }
    tail_lines(stderr, 1).first().map(|l| l.trim().to_string())
}

pub struct YtDlpEngine {
    binary: PathBuf,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn build_args(&self, url: &str, options: &EngineOptions) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            options.format_expression.clone(),
        ];

        if let Some(container) = &options.merge_container {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }
        if let Some(cookies) = &options.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        if let Some(ffmpeg) = &options.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().to_string());
        }

        args.extend([
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "-o".to_string(),
            options.output_template.clone(),
            "--windows-filenames".to_string(),
            "--no-overwrites".to_string(),
            "--progress-template".to_string(),
            format!(
                "download:{}%(progress.{{{}}})j",
                PROGRESS_PREFIX, PROGRESS_FIELDS
            ),
            "--progress-template".to_string(),
            format!(
                "postprocess:{}%(progress.{{status,postprocessor}})j",
                POST_PREFIX
            ),
            "--print".to_string(),
            format!(
                "after_move:{}%(.{{title,uploader,channel,filepath}})j",
                META_PREFIX
            ),
        ]);

        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        url: &str,
        options: &EngineOptions,
        emitter: &ProgressEmitter,
    ) -> Result<EngineMetadata, EngineFailure> {
        let args = self.build_args(url, options);
        debug!("running {} {}", self.binary.display(), args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let err = if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::ToolNotFound(format!("yt-dlp ({})", self.binary.display()))
                } else {
                    DownloadError::Io(e)
                };
                to_failure(err)
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| to_failure(DownloadError::Parse("failed to capture stdout".into())))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| to_failure(DownloadError::Parse("failed to capture stderr".into())))?;

        let read_stdout = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            let mut meta: Option<EngineMetadata> = None;
            let mut last_file: Option<PathBuf> = None;
            while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
                match parse_line(&line) {
                    EngineLine::Progress(raw) => {
                        if let Some(f) = &raw.filename {
                            last_file = Some(PathBuf::from(f));
                        }
                        emitter.raw(&raw);
                    }
                    EngineLine::PostProcess(pp) => {
                        if pp.status == "started" && pp.postprocessor == "Merger" {
                            emitter.log(LogLevel::Info, "Merging video and audio");
                        }
                        if pp.ends_download() {
                            emitter.phase_finished();
                        }
                    }
                    EngineLine::Metadata(m) => meta = Some(m),
                    EngineLine::Other => debug!("[yt-dlp] {}", line),
                }
            }
            (meta, last_file)
        };

        let read_stderr = async {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            let mut collected = Vec::new();
            while let Some(line) = next_line_lossy(&mut reader, &mut buf).await {
                if line.starts_with("WARNING:") {
                    emitter.log(LogLevel::Warning, line.clone());
                }
                collected.push(line);
            }
            collected.join("\n")
        };

        let ((meta, last_file), stderr_text) = tokio::join!(read_stdout, read_stderr);
        let status = child
            .wait()
            .await
            .map_err(|e| to_failure(DownloadError::Io(e)))?;

        if status.success() {
            let mut meta = meta.unwrap_or_default();
            if meta.filepath.is_none() {
                meta.filepath = last_file;
            }
            return Ok(meta);
        }

        let message = failure_message(&stderr_text)
            .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
        let detail = format!(
            "{}\n\n--- stderr ---\n{}\n\n--- arguments ---\n{}",
            status,
            stderr_text,
            args.join(" ")
        );
        Err(EngineFailure::new(message, detail))
    }
}

fn to_failure(err: DownloadError) -> EngineFailure {
    EngineFailure::new(err.to_string(), err.technical_detail())
}
