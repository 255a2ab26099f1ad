// Renamer - "<channel> - <title>.<ext>" after the download is on disk
//
// Never fatal: every problem becomes a skip reason and the job still succeeds.
// Never overwrites a different file: collisions get " (2)", " (3)", ...

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::models::{RenameOutcome, RenameSkip};

pub const MAX_PIECE_LEN: usize = 30;
pub const PLACEHOLDER: &str = "unknown";

lazy_static! {
    static ref ILLEGAL_RE: Regex = Regex::new(r#"[\\/:*?"<>|]+"#).unwrap();
    static ref SPACES_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Cleans one name piece (channel or title). Non-Latin text is kept as is.
pub fn sanitize_piece(name: &str, max_len: usize) -> String {
    let stripped = ILLEGAL_RE.replace_all(name, "");
    let no_controls: String = stripped
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = SPACES_RE.replace_all(&no_controls, " ");
    let trimmed = collapsed.trim();

    let cut: String = trimmed.chars().take(max_len).collect();
    let cut = cut.trim_end();
    if cut.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        cut.to_string()
    }
}

pub struct Renamer {
    max_piece_len: usize,
}

impl Default for Renamer {
    fn default() -> Self {
        Self {
            max_piece_len: MAX_PIECE_LEN,
        }
    }
}

impl Renamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing title falls back to "video", missing channel to "channel".
    pub fn rename(
        &self,
        finished_file: Option<&Path>,
        title: Option<&str>,
        channel: Option<&str>,
    ) -> RenameOutcome {
        let Some(src) = finished_file else {
            info!("rename skipped: engine reported no usable file path");
            return RenameOutcome::skipped(None, RenameSkip::PathUnavailable);
        };

        if !src.is_file() {
            info!("rename skipped: {} is not a regular file", src.display());
            return RenameOutcome::skipped(
                Some(src.to_path_buf()),
                RenameSkip::FileMissing(src.to_path_buf()),
            );
        }

        let folder = src.parent().unwrap_or_else(|| Path::new("."));
        if !is_writable_dir(folder) {
            info!("rename skipped: cannot write inside {}", folder.display());
            return RenameOutcome::skipped(
                Some(src.to_path_buf()),
                RenameSkip::DirectoryNotWritable(folder.to_path_buf()),
            );
        }

        let title = sanitize_piece(title.unwrap_or("video"), self.max_piece_len);
        let channel = sanitize_piece(channel.unwrap_or("channel"), self.max_piece_len);
        let ext = src
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let dst = free_name(folder, &format!("{} - {}", channel, title), &ext, src);
        if dst == src {
            return RenameOutcome::unchanged(dst);
        }

        match std::fs::rename(src, &dst) {
            Ok(()) => {
                info!("renamed {} -> {}", src.display(), dst.display());
                RenameOutcome::renamed(dst)
            }
            Err(e) => {
                warn!("rename of {} failed: {}", src.display(), e);
                RenameOutcome::skipped(Some(src.to_path_buf()), RenameSkip::Failed(e.to_string()))
            }
        }
    }
}

/// First of `base.ext`, `base (2).ext`, `base (3).ext`... that is free or is `src` itself
fn free_name(folder: &Path, base: &str, ext: &str, src: &Path) -> PathBuf {
    let first = folder.join(format!("{}{}", base, ext));
    if first == src || !first.exists() {
        return first;
    }
    let mut i: u32 = 2;
    loop {
        let candidate = folder.join(format!("{} ({}){}", base, i, ext));
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

/// Mode bits first, then a real create in `dir` so ownership and ACLs for the
/// current user count too. The check file is removed on drop.
fn is_writable_dir(dir: &Path) -> bool {
    let bits_allow = std::fs::metadata(dir)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false);
    bits_allow
        && tempfile::Builder::new()
            .prefix(".mdl-write-check")
            .tempfile_in(dir)
            .is_ok()
}
