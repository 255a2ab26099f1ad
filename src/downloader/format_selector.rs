// FormatSelector - picks the yt-dlp format expression
//
// Audio: best audio-only stream, nothing to merge.
// Video with a merge tool: best video + best audio merged into mp4.
// Video without one: a single pre-muxed stream that carries both codecs,
// so we never end up with separate unplayable tracks.

use tracing::warn;

use super::models::{FormatPlan, MediaMode, Quality};

pub const MERGE_CONTAINER: &str = "mp4";

pub const NO_MERGE_TOOL_WARNING: &str = "ffmpeg is not installed: downloading a single pre-merged \
     stream instead (quality may be lower). Install ffmpeg for the highest quality.";

/// Format selector for (mode, quality, merge tool availability)
pub struct FormatSelector;

impl FormatSelector {
    pub fn select(mode: MediaMode, ffmpeg_available: bool) -> FormatPlan {
        Self::select_with_quality(mode, Quality::Best, ffmpeg_available)
    }

    pub fn select_with_quality(
        mode: MediaMode,
        quality: Quality,
        ffmpeg_available: bool,
    ) -> FormatPlan {
        match mode {
            MediaMode::Audio => FormatPlan {
                expression: "bestaudio/best".to_string(),
                merge_container: None,
                quality_warning: None,
            },
            MediaMode::Video if ffmpeg_available => FormatPlan {
                expression: Self::merged_spec(quality),
                merge_container: Some(MERGE_CONTAINER.to_string()),
                quality_warning: None,
            },
            MediaMode::Video => {
                warn!("{}", NO_MERGE_TOOL_WARNING);
                FormatPlan {
                    expression: Self::premuxed_spec(quality),
                    merge_container: None,
                    quality_warning: Some(NO_MERGE_TOOL_WARNING.to_string()),
                }
            }
        }
    }

    fn merged_spec(quality: Quality) -> String {
        match quality.max_height() {
            None => "bestvideo*+bestaudio/best".to_string(),
            Some(h) => format!(
                "bestvideo*[height<={h}]+bestaudio/best[height<={h}]/bestvideo*+bestaudio/best"
            ),
        }
    }

    fn premuxed_spec(quality: Quality) -> String {
        match quality.max_height() {
            None => "best[ext=mp4][vcodec!=none][acodec!=none]/best".to_string(),
            Some(h) => format!(
                "best[height<={h}][ext=mp4][vcodec!=none][acodec!=none]/best[height<={h}]/best"
            ),
        }
    }
}
