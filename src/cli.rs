// Command-line surface: argument model, job rendering, subcommands

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use time::macros::format_description;

use crate::config::AppConfig;
use crate::downloader::{
    ActivityEntry, CookieResolver, DownloadOrchestrator, DownloadRequest, GatedPlatform, JobEvent,
    JobResult, JobState, LogLevel, MediaMode, ProgressPhase, ProgressSample, Quality, ToolManager,
    ToolType,
};
use crate::ytdlp::YtDlpEngine;

const BAR_WIDTH: usize = 24;

#[derive(Parser)]
#[command(name = "media-downloader")]
#[command(
    author,
    version,
    about = "Download video or audio from a link with yt-dlp",
    long_about = None
)]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download one URL
    Download {
        url: String,

        /// Audio only
        #[arg(short, long)]
        audio: bool,

        /// Maximum video height: best, 1080p, 720p, 480p, 360p
        #[arg(short, long, default_value = "best")]
        quality: Quality,

        /// Destination folder (created if missing)
        #[arg(short, long)]
        output: Option<String>,

        /// Netscape cookie file
        #[arg(short, long)]
        cookies: Option<PathBuf>,

        /// ffmpeg binary
        #[arg(long)]
        ffmpeg: Option<PathBuf>,

        /// yt-dlp binary
        #[arg(long = "yt-dlp")]
        ytdlp: Option<PathBuf>,

        /// Print the full technical detail on failure
        #[arg(long)]
        details: bool,

        /// No progress or activity output, only the final report
        #[arg(long)]
        quiet: bool,
    },

    /// Show yt-dlp / ffmpeg status
    Tools,

    /// List cookie files that would be picked up for gated links
    Cookies {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the suggested default destination
    SuggestDir,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

pub async fn execute(cli: Cli, mut config: AppConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Download {
            url,
            audio,
            quality,
            output,
            cookies,
            ffmpeg,
            ytdlp,
            details,
            quiet,
        } => {
            if ffmpeg.is_some() {
                config.ffmpeg_path = ffmpeg;
            }
            if ytdlp.is_some() {
                config.ytdlp_path = ytdlp;
            }
            let save_dir = output
                .unwrap_or_else(|| default_save_dir(&config).to_string_lossy().to_string());
            let mode = if audio { MediaMode::Audio } else { MediaMode::Video };
            let request = DownloadRequest::new(url, mode, save_dir)
                .with_quality(quality)
                .with_cookie_file(cookies.or_else(|| config.cookie_file.clone()));
            download(request, &config, details, quiet).await
        }
        Commands::Tools => {
            show_tools(&config).await;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Cookies { output } => {
            let save_dir = output.unwrap_or_else(|| default_save_dir(&config));
            show_cookies(&config, save_dir);
            Ok(ExitCode::SUCCESS)
        }
        Commands::SuggestDir => {
            println!("{}", config.layout().suggest_save_dir().display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn default_save_dir(config: &AppConfig) -> PathBuf {
    config
        .save_dir
        .clone()
        .unwrap_or_else(|| config.layout().suggest_save_dir())
}

async fn download(
    request: DownloadRequest,
    config: &AppConfig,
    details: bool,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let tools = ToolManager::new(config.ytdlp_path.clone(), config.ffmpeg_path.clone());
    // A missing yt-dlp surfaces as a job failure with the usual detail
    let ytdlp = tools
        .locate(ToolType::YtDlp)
        .await
        .unwrap_or_else(|| PathBuf::from("yt-dlp"));
    let ffmpeg = tools.locate(ToolType::Ffmpeg).await;

    let orchestrator = Arc::new(
        DownloadOrchestrator::new(Arc::new(YtDlpEngine::new(ytdlp)))
            .with_ffmpeg(ffmpeg)
            .with_layout(config.layout()),
    );

    let mut handle = orchestrator.submit(request);
    if quiet {
        let result = handle
            .wait()
            .await
            .context("download job ended without a result")?;
        return Ok(report(&result, details));
    }

    let mut tick = 0usize;
    let mut progress_shown = false;
    let mut result: Option<JobResult> = None;

    while let Some(event) = handle.next_event().await {
        match event {
            JobEvent::Progress(sample) => {
                tick += 1;
                eprint!("\r{:<78}", progress_line(&sample, tick));
                let _ = std::io::stderr().flush();
                progress_shown = true;
            }
            JobEvent::Log(entry) => {
                if progress_shown {
                    eprintln!();
                    progress_shown = false;
                }
                eprintln!("{}", activity_line(&entry));
            }
            JobEvent::State(state) if state.is_terminal() => {
                if progress_shown {
                    eprintln!();
                    progress_shown = false;
                }
            }
            JobEvent::State(JobState::Running) => eprintln!("Downloading..."),
            JobEvent::State(_) => {}
            JobEvent::Finished(r) => result = Some(r),
        }
    }

    let result = result.context("download job ended without a result")?;
    Ok(report(&result, details))
}

fn report(result: &JobResult, details: bool) -> ExitCode {
    if result.succeeded {
        println!("Done: {}", result.final_title);
        if let Some(path) = &result.final_path {
            println!("Saved to {}", path.display());
        }
        return ExitCode::SUCCESS;
    }

    let category = result
        .error_category
        .map(|c| c.to_string())
        .unwrap_or_else(|| "download failed".to_string());
    eprintln!("Failed ({}): {}", category, result.final_title);
    if let Some(message) = &result.user_message {
        eprintln!("{}", message);
    }
    if details {
        if let Some(raw) = &result.raw_error {
            eprintln!("\n--- error ---\n{}", raw);
        }
        if let Some(detail) = &result.technical_detail {
            eprintln!("\n--- technical detail ---\n{}", detail);
        }
    } else {
        eprintln!("(run again with --details for the full error)");
    }
    ExitCode::FAILURE
}

/// Determinate bar when the size is known, a bouncing marker otherwise
pub fn progress_line(sample: &ProgressSample, tick: usize) -> String {
    if sample.phase == ProgressPhase::Finishing {
        return sample.status_line();
    }
    match sample.percent() {
        Some(pct) => {
            let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
            format!(
                "[{}{}] {:>5.1}%  {}  ETA {}",
                "#".repeat(filled),
                "-".repeat(BAR_WIDTH - filled),
                pct,
                sample.speed_label(),
                sample.eta_label()
            )
        }
        None => {
            let span = BAR_WIDTH - 3;
            let step = tick % (2 * span);
            let pos = if step < span { step } else { 2 * span - step };
            format!(
                "[{}<=>{}]   ?  {} so far  {}",
                " ".repeat(pos),
                " ".repeat(span - pos),
                format_bytes(sample.downloaded_bytes),
                sample.speed_label()
            )
        }
    }
}

pub fn activity_line(entry: &ActivityEntry) -> String {
    let stamp = entry
        .at
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default();
    let level = match entry.level {
        LogLevel::Info => "info",
        LogLevel::Warning => "warn",
        LogLevel::Error => "error",
    };
    format!("[{}] {:<5} {}", stamp, level, entry.message)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

async fn show_tools(config: &AppConfig) {
    let manager = ToolManager::new(config.ytdlp_path.clone(), config.ffmpeg_path.clone());
    for tool in manager.get_all_tools().await {
        let status = if tool.is_available { "ok" } else { "missing" };
        let path = tool
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<8} {:<40} {}",
            tool.name,
            status,
            tool.version.as_deref().unwrap_or("-"),
            path
        );
    }
}

fn show_cookies(config: &AppConfig, save_dir: PathBuf) {
    let resolver = CookieResolver::new(config.layout(), GatedPlatform::default());
    let candidates = resolver.candidates(&save_dir);
    if candidates.is_empty() {
        println!("No cookie files found.");
    }
    for c in &candidates {
        println!("{}  {}", c.rank, c.path.display());
    }
    match resolver.resolve(config.cookie_file.as_deref(), &save_dir) {
        Some(path) => println!("Would use: {}", path.display()),
        None => println!("Would use: none"),
    }
}
