// ProgressTracker - turns raw engine progress into normalized job-level samples
//
// A job may download several streams (video + audio before a merge). Bytes are
// accumulated across them so samples never go backwards for the whole job, and
// the Finishing transition is emitted at most once per job.

use std::path::PathBuf;

use super::models::{ProgressPhase, ProgressSample, RawProgress};

/// Placeholder for unknown speed / ETA
pub const UNKNOWN: &str = "—";

const SPEED_UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];

#[derive(Debug, Default)]
pub struct ProgressTracker {
    current_file: Option<PathBuf>,
    current_downloaded: u64,
    current_total: u64,
    /// The engine reported the current stream as written
    current_done: bool,
    /// Bytes of streams that are already complete
    completed_bytes: u64,
    last_downloaded: u64,
    last_total: u64,
    finished: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one raw record. `None` when the record must not reach observers
    /// (a regression, a stream marker, or anything after the job finished).
    pub fn on_sample(&mut self, raw: &RawProgress) -> Option<ProgressSample> {
        let filename = raw.filename.as_deref().map(PathBuf::from);
        if raw.status == "finished" {
            self.stream_done(filename);
            return None;
        }
        if raw.status != "downloading" || self.finished {
            return None;
        }

        self.switch_file(filename);
        if self.current_done {
            return None;
        }

        let total = raw
            .total_bytes
            .filter(|t| t.is_finite() && *t > 0.0)
            .or_else(|| raw.total_bytes_estimate.filter(|t| t.is_finite() && *t > 0.0))
            .map(|t| t as u64)
            .unwrap_or(0);
        let mut downloaded = raw
            .downloaded_bytes
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d as u64)
            .unwrap_or(0);
        if total > 0 {
            downloaded = downloaded.min(total);
        }
        if downloaded < self.current_downloaded {
            return None;
        }
        self.current_downloaded = downloaded;
        self.current_total = total;

        let job_downloaded = self.completed_bytes + downloaded;
        let job_total = if total > 0 {
            self.completed_bytes + total
        } else {
            0
        };
        if job_downloaded < self.last_downloaded {
            return None;
        }
        self.last_downloaded = job_downloaded;
        self.last_total = job_total;

        Some(ProgressSample {
            downloaded_bytes: job_downloaded,
            total_bytes: job_total,
            speed_bytes_per_sec: raw
                .speed
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(0.0),
            eta_seconds: raw
                .eta
                .filter(|e| e.is_finite() && *e >= 0.0)
                .map(|e| e.round() as u64),
            phase: ProgressPhase::Downloading,
            filename: self.current_file.clone(),
        })
    }

    /// All streams are on disk; post-processing may follow. Only the first call
    /// yields a sample.
    pub fn on_phase_finished(&mut self) -> Option<ProgressSample> {
        if self.finished {
            return None;
        }
        self.finished = true;

        let bytes = self.last_total.max(self.last_downloaded);
        Some(ProgressSample {
            downloaded_bytes: bytes,
            total_bytes: if self.last_total > 0 { bytes } else { 0 },
            speed_bytes_per_sec: 0.0,
            eta_seconds: Some(0),
            phase: ProgressPhase::Finishing,
            filename: self.current_file.clone(),
        })
    }

    fn stream_done(&mut self, filename: Option<PathBuf>) {
        self.switch_file(filename);
        if !self.current_done {
            self.completed_bytes += self.current_total.max(self.current_downloaded);
            self.current_downloaded = 0;
            self.current_total = 0;
            self.current_done = true;
        }
    }

    fn switch_file(&mut self, filename: Option<PathBuf>) {
        if filename.is_none() || filename == self.current_file {
            return;
        }
        if !self.current_done {
            self.completed_bytes += self.current_downloaded;
        }
        self.current_file = filename;
        self.current_downloaded = 0;
        self.current_total = 0;
        self.current_done = false;
    }
}

impl ProgressSample {
    /// Percent in [0, 100]; `None` while the total size is unknown
    pub fn percent(&self) -> Option<f64> {
        if self.phase == ProgressPhase::Finishing {
            return Some(100.0);
        }
        if self.total_bytes == 0 {
            return None;
        }
        let pct = self.downloaded_bytes as f64 / self.total_bytes as f64 * 100.0;
        Some(pct.clamp(0.0, 100.0))
    }

    pub fn speed_label(&self) -> String {
        format_speed(self.speed_bytes_per_sec)
    }

    pub fn eta_label(&self) -> String {
        format_eta(self.eta_seconds)
    }

    /// One-line status for display
    pub fn status_line(&self) -> String {
        match self.phase {
            ProgressPhase::Finishing => {
                "File downloaded, finishing (merging if needed)...".to_string()
            }
            ProgressPhase::Downloading => {
                let pct = match self.percent() {
                    Some(p) => format!("{}%", p as u32),
                    None => "unknown".to_string(),
                };
                format!(
                    "Progress: {}  |  Speed: {}  |  Remaining: {}",
                    pct,
                    self.speed_label(),
                    self.eta_label()
                )
            }
        }
    }
}

/// Binary steps, one decimal: `1536` → `1.5 KB/s`
pub fn format_speed(bytes_per_sec: f64) -> String {
    if !bytes_per_sec.is_finite() || bytes_per_sec <= 0.0 {
        return UNKNOWN.to_string();
    }
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1024.0 && unit < SPEED_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SPEED_UNITS[unit])
}

/// `M:SS`, or `H:MM:SS` from one hour on
pub fn format_eta(seconds: Option<u64>) -> String {
    let Some(total) = seconds else {
        return UNKNOWN.to_string();
    };
    let (minutes, secs) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloading(downloaded: f64, total: Option<f64>, file: &str) -> RawProgress {
        RawProgress {
            status: "downloading".to_string(),
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            speed: Some(2048.0),
            eta: Some(65.0),
            filename: Some(file.to_string()),
            ..Default::default()
        }
    }

    fn finished(file: &str) -> RawProgress {
        RawProgress {
            status: "finished".to_string(),
            filename: Some(file.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_percent_and_labels() {
        let mut t = ProgressTracker::new();
        let s = t.on_sample(&downloading(250.0, Some(1000.0), "a.mp4")).unwrap();
        assert_eq!(s.percent(), Some(25.0));
        assert_eq!(s.speed_label(), "2.0 KB/s");
        assert_eq!(s.eta_label(), "1:05");
        assert!(s.status_line().contains("25%"));
    }

    #[test]
    fn test_unknown_total_is_indeterminate() {
        let mut t = ProgressTracker::new();
        let s = t.on_sample(&downloading(5000.0, None, "a.mp4")).unwrap();
        assert_eq!(s.total_bytes, 0);
        assert_eq!(s.percent(), None);
        assert!(s.status_line().contains("unknown"));
    }

    #[test]
    fn test_estimate_used_when_total_missing() {
        let mut t = ProgressTracker::new();
        let mut raw = downloading(500.0, None, "a.mp4");
        raw.total_bytes_estimate = Some(2000.0);
        let s = t.on_sample(&raw).unwrap();
        assert_eq!(s.total_bytes, 2000);
        assert_eq!(s.percent(), Some(25.0));
    }

    #[test]
    fn test_overshoot_clamped_to_100() {
        let mut t = ProgressTracker::new();
        let s = t.on_sample(&downloading(1500.0, Some(1000.0), "a.mp4")).unwrap();
        assert_eq!(s.downloaded_bytes, 1000);
        assert_eq!(s.percent(), Some(100.0));

        let odd = ProgressSample {
            downloaded_bytes: 5000,
            total_bytes: 10,
            speed_bytes_per_sec: 0.0,
            eta_seconds: None,
            phase: ProgressPhase::Downloading,
            filename: None,
        };
        assert_eq!(odd.percent(), Some(100.0));
    }

    #[test]
    fn test_regressions_dropped() {
        let mut t = ProgressTracker::new();
        assert!(t.on_sample(&downloading(600.0, Some(1000.0), "a.mp4")).is_some());
        assert!(t.on_sample(&downloading(400.0, Some(1000.0), "a.mp4")).is_none());
        assert!(t.on_sample(&downloading(700.0, Some(1000.0), "a.mp4")).is_some());
    }

    #[test]
    fn test_finish_once_per_job() {
        let mut t = ProgressTracker::new();
        t.on_sample(&downloading(1000.0, Some(1000.0), "v.mp4"));
        assert!(t.on_sample(&finished("v.mp4")).is_none());
        // late sample for a stream already written
        assert!(t.on_sample(&downloading(1000.0, Some(1000.0), "v.mp4")).is_none());

        let fin = t.on_phase_finished().unwrap();
        assert_eq!(fin.phase, ProgressPhase::Finishing);
        assert_eq!(fin.percent(), Some(100.0));
        assert_eq!(fin.downloaded_bytes, 1000);
        assert!(t.on_phase_finished().is_none());
        assert!(t.on_sample(&downloading(5.0, Some(10.0), "other.m4a")).is_none());
    }

    #[test]
    fn test_two_stream_job_is_monotonic() {
        let mut t = ProgressTracker::new();
        let mut emitted = Vec::new();
        let records = [
            downloading(1000.0, Some(1000.0), "v.f137.mp4"),
            finished("v.f137.mp4"),
            downloading(10.0, Some(100.0), "v.f140.m4a"),
            downloading(100.0, Some(100.0), "v.f140.m4a"),
            finished("v.f140.m4a"),
        ];
        for raw in &records {
            emitted.extend(t.on_sample(raw));
        }
        emitted.extend(t.on_phase_finished());

        let bytes: Vec<u64> = emitted.iter().map(|s| s.downloaded_bytes).collect();
        assert_eq!(bytes, vec![1000, 1010, 1100, 1100]);
        assert_eq!(emitted[1].total_bytes, 1100);
        let finishing: Vec<_> = emitted
            .iter()
            .filter(|s| s.phase == ProgressPhase::Finishing)
            .collect();
        assert_eq!(finishing.len(), 1);
        assert_eq!(emitted.last().map(|s| s.phase), Some(ProgressPhase::Finishing));
    }

    #[test]
    fn test_stream_without_finished_marker_still_counts() {
        let mut t = ProgressTracker::new();
        t.on_sample(&downloading(300.0, Some(300.0), "v.f137.mp4"));
        let s = t.on_sample(&downloading(50.0, None, "v.f140.m4a")).unwrap();
        assert_eq!(s.downloaded_bytes, 350);
        assert_eq!(s.percent(), None);
    }

    #[test]
    fn test_unrelated_status_ignored() {
        let mut t = ProgressTracker::new();
        let raw = RawProgress {
            status: "error".to_string(),
            ..Default::default()
        };
        assert!(t.on_sample(&raw).is_none());
    }

    #[test]
    fn test_format_speed_ladder() {
        assert_eq!(format_speed(0.0), UNKNOWN);
        assert_eq!(format_speed(-5.0), UNKNOWN);
        assert_eq!(format_speed(f64::NAN), UNKNOWN);
        assert_eq!(format_speed(512.0), "512.0 B/s");
        assert_eq!(format_speed(1536.0), "1.5 KB/s");
        assert_eq!(format_speed(3.0 * 1024.0 * 1024.0), "3.0 MB/s");
        assert_eq!(format_speed(2.0 * 1024.0 * 1024.0 * 1024.0), "2.0 GB/s");
        assert_eq!(format_speed(4096.0 * 1024.0 * 1024.0 * 1024.0), "4096.0 GB/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(None), UNKNOWN);
        assert_eq!(format_eta(Some(0)), "0:00");
        assert_eq!(format_eta(Some(59)), "0:59");
        assert_eq!(format_eta(Some(61)), "1:01");
        assert_eq!(format_eta(Some(3599)), "59:59");
        assert_eq!(format_eta(Some(3600)), "1:00:00");
        assert_eq!(format_eta(Some(3725)), "1:02:05");
    }
}
