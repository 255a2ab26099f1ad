// Error classification - maps a raw engine failure to a user-facing category
//
// Only gated-platform URLs get access-restriction analysis. Everything else is
// Generic and the raw text is shown unchanged.

use serde::Serialize;
use std::path::Path;

use super::models::ErrorCategory;
use super::platform::GatedPlatform;

/// Result of classifying one failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: ErrorCategory,
    /// Short actionable message
    pub user_message: String,
    /// Restriction markers that matched
    pub matched_markers: Vec<String>,
}

pub struct ErrorClassifier {
    platform: GatedPlatform,
    app_dir_name: String,
}

impl ErrorClassifier {
    pub fn new(platform: GatedPlatform, app_dir_name: impl Into<String>) -> Self {
        Self {
            platform,
            app_dir_name: app_dir_name.into(),
        }
    }

    pub fn classify(
        &self,
        raw_error: &str,
        url: &str,
        cookie_file: Option<&Path>,
    ) -> Classification {
        if !self.platform.matches_url(url) {
            return generic(raw_error);
        }

        let matched = self.platform.matched_markers(raw_error);
        if matched.is_empty() {
            return generic(raw_error);
        }

        let name = &self.platform.name;
        match cookie_file {
            Some(path) => Classification {
                category: ErrorCategory::StillBlockedWithCookies,
                user_message: format!(
                    "{name} refused access to this post for unverified accounts. \
                     The cookie file {} was used but access is still denied. \
                     Try fresh cookies from an older account that is allowed to see this content.",
                    path.display()
                ),
                matched_markers: matched,
            },
            None => Classification {
                category: ErrorCategory::BlockedNeedsCookies,
                user_message: format!(
                    "This {name} link is restricted (age/privacy). \
                     Add a {name} cookie file in Netscape format and try again: \
                     pass it with --cookies, or save it as '{}' inside Download/{}.",
                    self.platform.cookie_file_name, self.app_dir_name
                ),
                matched_markers: matched,
            },
        }
    }
}

fn generic(raw_error: &str) -> Classification {
    Classification {
        category: ErrorCategory::Generic,
        user_message: raw_error.to_string(),
        matched_markers: Vec::new(),
    }
}
