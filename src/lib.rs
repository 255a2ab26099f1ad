pub mod cli;
pub mod config;
pub mod downloader;
pub mod ytdlp;

use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::AppConfig;

pub use downloader::{DownloadOrchestrator, DownloadRequest, JobEvent, JobResult, MediaMode};
pub use ytdlp::YtDlpEngine;

const DEFAULT_FILTER: &str = "media_downloader_lib=info";

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "media_downloader_lib=debug"
        } else {
            DEFAULT_FILTER
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config = AppConfig::load()?;
    tracing::debug!("config: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::execute(cli, config))
}
