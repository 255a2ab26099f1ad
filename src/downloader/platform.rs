// Gated platform definition
//
// A gated platform may refuse anonymous access (age, region, login checks).
// Requests to it get cookie auto-discovery and friendly block messages.

use super::utils::url_host;

#[derive(Debug, Clone)]
pub struct GatedPlatform {
    /// Display name used in user messages
    pub name: String,
    /// Host suffixes that belong to the platform
    pub hosts: Vec<String>,
    /// Token expected in site-specific cookie file names
    pub site_token: String,
    /// Canonical cookie file name users are told to create
    pub cookie_file_name: String,
    /// Lowercase phrases in engine errors that mean access was refused
    pub blocked_markers: Vec<String>,
}

impl GatedPlatform {
    pub fn instagram() -> Self {
        Self {
            name: "Instagram".to_string(),
            hosts: vec!["instagram.com".to_string(), "instagr.am".to_string()],
            site_token: "instagram".to_string(),
            cookie_file_name: "instagram_cookies.txt".to_string(),
            blocked_markers: [
                "this content may be inappropriate",
                "unavailable for certain audiences",
                "restricted video",
                "login required",
                "you need to log in",
                "private",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    /// Exact host or a subdomain of it. Scheme-less input is parsed as https.
    pub fn matches_url(&self, url: &str) -> bool {
        let Some(host) = url_host(url).or_else(|| url_host(&format!("https://{}", url.trim())))
        else {
            return false;
        };
        self.hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    }

    /// Markers found in `error`, case-insensitive
    pub fn matched_markers(&self, error: &str) -> Vec<String> {
        let lower = error.to_lowercase();
        self.blocked_markers
            .iter()
            .filter(|m| lower.contains(m.as_str()))
            .cloned()
            .collect()
    }
}

impl Default for GatedPlatform {
    fn default() -> Self {
        Self::instagram()
    }
}
