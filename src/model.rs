//! Core data types shared across the engine.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Supported platforms. Each maps to one extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Instagram,
    Youtube,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Tiktok,
        Platform::Instagram,
        Platform::Youtube,
        Platform::Facebook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Youtube => "youtube",
            Platform::Facebook => "facebook",
        }
    }

    /// Platforms whose data sits behind a manually established login.
    pub fn is_session_gated(&self) -> bool {
        matches!(self, Platform::Instagram | Platform::Facebook)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tiktok" => Ok(Platform::Tiktok),
            "instagram" => Ok(Platform::Instagram),
            "youtube" => Ok(Platform::Youtube),
            "facebook" => Ok(Platform::Facebook),
            other => Err(Error::UnknownPlatform(other.to_string())),
        }
    }
}

/// Whether the login session held up during an authenticated extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session was involved, or the session was accepted.
    #[default]
    Ok,
    /// The platform bounced the stored cookies to its login page.
    Expired,
}

/// One extraction attempt's normalized output.
///
/// Every metric field is independently optional: `None` means "could not
/// be determined this attempt", never zero. A literal zero is meaningful
/// (it feeds the shadowban heuristic) and must survive end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub platform: Platform,
    pub username: String,
    pub followers: Option<i64>,
    /// Calendar date of the latest non-pinned post. No time of day; for
    /// relative source text this is derived from the evaluation instant.
    pub last_post_date: Option<NaiveDate>,
    pub last_post_views: Option<i64>,
    pub last_post_likes: Option<i64>,
    pub last_post_saves: Option<i64>,
    #[serde(default)]
    pub session: SessionState,
}

impl Snapshot {
    pub fn empty(platform: Platform, username: impl Into<String>) -> Self {
        Self {
            platform,
            username: username.into(),
            followers: None,
            last_post_date: None,
            last_post_views: None,
            last_post_likes: None,
            last_post_saves: None,
            session: SessionState::Ok,
        }
    }

    /// All-null snapshot flagged as session-expired.
    pub fn session_expired(platform: Platform, username: impl Into<String>) -> Self {
        Self {
            session: SessionState::Expired,
            ..Self::empty(platform, username)
        }
    }

    /// Number of populated metric fields, 0..=5. Drives retry scoring.
    pub fn score(&self) -> u32 {
        [
            self.followers.is_some(),
            self.last_post_date.is_some(),
            self.last_post_views.is_some(),
            self.last_post_likes.is_some(),
            self.last_post_saves.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count() as u32
    }

    /// Populated count among the four post-level fields.
    pub fn post_field_count(&self) -> u32 {
        [
            self.last_post_date.is_some(),
            self.last_post_views.is_some(),
            self.last_post_likes.is_some(),
            self.last_post_saves.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.score() == 0
    }
}

/// Serialized browser cookie, the unit of persisted login state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Unix seconds; `None` or a negative value means a session cookie.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip() {
        for p in Platform::ALL {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_score_counts_fields() {
        let mut snap = Snapshot::empty(Platform::Tiktok, "user");
        assert_eq!(snap.score(), 0);
        snap.followers = Some(10);
        snap.last_post_views = Some(0);
        assert_eq!(snap.score(), 2);
        assert_eq!(snap.post_field_count(), 1);
    }

    #[test]
    fn test_zero_views_is_not_empty() {
        // Zero is a real value; only None means "unknown".
        let mut snap = Snapshot::empty(Platform::Tiktok, "user");
        snap.last_post_views = Some(0);
        assert!(!snap.is_empty());
        assert_ne!(snap.last_post_views, None);
    }
}
