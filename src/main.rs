use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    media_downloader_lib::run()
}
