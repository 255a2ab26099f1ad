// CookieResolver - finds a cookie file for gated sources
//
// Priority:
// 1. File explicitly picked by the user (if it exists)
// 2. Scan of conventional download directories + save dir, plus well-known paths,
//    ranked by file name
//
// Read-only. Missing or unreadable directories contribute nothing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::models::CookieCandidate;
use super::paths::StorageLayout;
use super::platform::GatedPlatform;

const GENERIC_COOKIE_FILE: &str = "cookies.txt";
const COOKIE_EXTENSIONS: &[&str] = &[".txt", ".cookies", ".cookie"];

pub struct CookieResolver {
    layout: StorageLayout,
    platform: GatedPlatform,
}

impl CookieResolver {
    pub fn new(layout: StorageLayout, platform: GatedPlatform) -> Self {
        Self { layout, platform }
    }

    /// Explicit existing file wins outright; otherwise the best ranked candidate.
    pub fn resolve(&self, explicit: Option<&Path>, save_dir: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                debug!("using explicitly selected cookie file {}", path.display());
                return Some(path.to_path_buf());
            }
            info!(
                "selected cookie file {} does not exist, falling back to discovery",
                path.display()
            );
        }

        let best = self.candidates(save_dir).into_iter().next().map(|c| c.path);
        match &best {
            Some(path) => info!("auto-detected cookie file {}", path.display()),
            None => debug!("no cookie file found"),
        }
        best
    }

    /// All existing candidates, sorted best first
    pub fn candidates(&self, save_dir: &Path) -> Vec<CookieCandidate> {
        let mut dirs = self.layout.download_dirs();
        dirs.push(save_dir.to_path_buf());

        let mut seen_dirs = HashSet::new();
        let mut hits: Vec<PathBuf> = Vec::new();
        for dir in dirs {
            if seen_dirs.insert(dir.clone()) {
                hits.extend(scan_dir(&dir));
            }
        }

        hits.extend(
            self.well_known_paths(save_dir)
                .into_iter()
                .filter(|p| p.is_file()),
        );

        let mut seen = HashSet::new();
        let mut candidates: Vec<CookieCandidate> = hits
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .map(|path| CookieCandidate {
                rank: self.rank(&path),
                path,
            })
            .collect();
        candidates.sort();
        candidates
    }

    /// 0 canonical name, 1 site token + "cookie", 2 generic cookies.txt, 3 anything else
    pub fn rank(&self, path: &Path) -> u8 {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name == self.platform.cookie_file_name.to_lowercase() {
            0
        } else if name.contains(&self.platform.site_token) && name.contains("cookie") {
            1
        } else if name == GENERIC_COOKIE_FILE {
            2
        } else {
            3
        }
    }

    /// Fixed locations checked even when the scan misses them
    pub fn well_known_paths(&self, save_dir: &Path) -> Vec<PathBuf> {
        let canonical = self.platform.cookie_file_name.as_str();
        let domain_named = format!("{}.com_cookies.txt", self.platform.site_token);
        let app = self.layout.app_dir_name.as_str();
        let internal = self.layout.internal_download_dir();
        let sdcard = self.layout.storage_base.join("sdcard1").join("Download");

        vec![
            save_dir.join(canonical),
            internal.join(app).join(canonical),
            internal.join(canonical),
            internal.join(&domain_named),
            sdcard.join(app).join(canonical),
            sdcard.join(canonical),
            sdcard.join(&domain_named),
            save_dir.join(GENERIC_COOKIE_FILE),
            internal.join(app).join(GENERIC_COOKIE_FILE),
            internal.join(GENERIC_COOKIE_FILE),
            sdcard.join(app).join(GENERIC_COOKIE_FILE),
            sdcard.join(GENERIC_COOKIE_FILE),
        ]
    }
}

/// Whether a lowercase file name looks like a cookie jar
fn is_cookie_file_name(name: &str) -> bool {
    if !name.contains("cookie") {
        return false;
    }
    !name.contains('.') || COOKIE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Top-level cookie-looking files in `dir`. Errors mean zero hits.
fn scan_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_cookie_file_name(&entry.file_name().to_string_lossy().to_lowercase()))
        .map(|entry| entry.path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _tmp: tempfile::TempDir,
        base: PathBuf,
        save_dir: PathBuf,
        resolver: CookieResolver,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_path_buf();
        let layout = StorageLayout {
            storage_base: base.join("storage"),
            internal_root: base.join("storage/emulated/0"),
            app_dir_name: "App".to_string(),
            desktop_downloads: None,
        };
        std::fs::create_dir_all(layout.internal_download_dir().join("App")).unwrap();
        let save_dir = base.join("save");
        std::fs::create_dir_all(&save_dir).unwrap();
        Fixture {
            _tmp: tmp,
            base,
            save_dir,
            resolver: CookieResolver::new(layout, GatedPlatform::instagram()),
        }
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "# Netscape HTTP Cookie File\n").unwrap();
    }

    #[test]
    fn test_cookie_file_name_filter() {
        assert!(is_cookie_file_name("cookies.txt"));
        assert!(is_cookie_file_name("my.cookies"));
        assert!(is_cookie_file_name("session.cookie"));
        assert!(is_cookie_file_name("cookiejar"));
        assert!(!is_cookie_file_name("cookies.json"));
        assert!(!is_cookie_file_name("notes.txt"));
    }

    #[test]
    fn test_rank_scores() {
        let f = fixture();
        let r = &f.resolver;
        assert_eq!(r.rank(Path::new("/x/instagram_cookies.txt")), 0);
        assert_eq!(r.rank(Path::new("/x/Instagram_Cookies.TXT")), 0);
        assert_eq!(r.rank(Path::new("/x/instagram.com_cookies.txt")), 1);
        assert_eq!(r.rank(Path::new("/x/cookies.txt")), 2);
        assert_eq!(r.rank(Path::new("/x/yt_cookies.txt")), 3);
    }

    #[test]
    fn test_canonical_beats_generic_beats_other() {
        let f = fixture();
        let download = f.base.join("storage/emulated/0/Download");
        touch(&download.join("zz_cookie.txt"));
        touch(&download.join("cookies.txt"));
        touch(&f.save_dir.join("instagram_cookies.txt"));

        let list = f.resolver.candidates(&f.save_dir);
        let names: Vec<String> = list
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["instagram_cookies.txt", "cookies.txt", "zz_cookie.txt"]);
        assert_eq!(
            f.resolver.resolve(None, &f.save_dir),
            Some(f.save_dir.join("instagram_cookies.txt"))
        );
    }

    #[test]
    fn test_explicit_file_wins() {
        let f = fixture();
        touch(&f.save_dir.join("instagram_cookies.txt"));
        let explicit = f.base.join("elsewhere/picked.dat");
        touch(&explicit);

        assert_eq!(
            f.resolver.resolve(Some(&explicit), &f.save_dir),
            Some(explicit.clone())
        );
    }

    #[test]
    fn test_missing_explicit_falls_back_to_scan() {
        let f = fixture();
        touch(&f.save_dir.join("cookies.txt"));
        let missing = f.base.join("gone.txt");
        assert_eq!(
            f.resolver.resolve(Some(&missing), &f.save_dir),
            Some(f.save_dir.join("cookies.txt"))
        );
    }

    #[test]
    fn test_scan_is_not_recursive_and_skips_dirs() {
        let f = fixture();
        touch(&f.save_dir.join("nested/deeper/cookies.txt"));
        std::fs::create_dir_all(f.save_dir.join("cookies_dir")).unwrap();
        assert!(f.resolver.candidates(&f.save_dir).is_empty());
        assert_eq!(f.resolver.resolve(None, &f.save_dir), None);
    }

    #[test]
    fn test_duplicates_collapse() {
        let f = fixture();
        let app_dir = f.base.join("storage/emulated/0/Download/App");
        touch(&app_dir.join("instagram_cookies.txt"));
        // save dir equals a scanned directory and a well-known location
        let list = f.resolver.candidates(&app_dir);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].rank, 0);
    }

    #[test]
    fn test_unreadable_save_dir_is_silent() {
        let f = fixture();
        assert!(f.resolver.candidates(Path::new("/no/such/dir")).is_empty());
    }
}
