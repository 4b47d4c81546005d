//! Configuration management.
//!
//! Settings come from an optional TOML file with per-field defaults that
//! mirror the platforms' observed tolerance: one slot for login-gated
//! platforms, two for anonymous high-volume scraping, and the YouTube API
//! effectively unthrottled. The API key may also arrive via environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::Platform;

/// Environment variable consulted when no API key is configured.
pub const YOUTUBE_API_KEY_ENV: &str = "SNSPULSE_YOUTUBE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub youtube: YoutubeSettings,

    /// Directory for persisted login cookies. Defaults to the per-user
    /// data directory.
    #[serde(default)]
    pub session_dir: Option<PathBuf>,

    /// Per-platform overrides for slots, pacing and retry.
    #[serde(default)]
    pub platforms: HashMap<Platform, PlatformSettings>,

    /// Upper bound on waiting for a concurrency slot, in seconds.
    #[serde(default = "default_slot_wait_secs")]
    pub slot_wait_secs: u64,
}

// A derived Default would zero `slot_wait_secs`; the out-of-box path
// (no config file) goes through this impl and must match the serde
// defaults.
impl Default for Settings {
    fn default() -> Self {
        Self {
            browser: BrowserSettings::default(),
            youtube: YoutubeSettings::default(),
            session_dir: None,
            platforms: HashMap::new(),
            slot_wait_secs: default_slot_wait_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium executable. Auto-detected when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Run the shared scraping browser headless (default: true). The
    /// manual-login browser is always headed regardless.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Per-navigation timeout in seconds.
    #[serde(default = "default_nav_timeout")]
    pub nav_timeout_secs: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            nav_timeout_secs: default_nav_timeout(),
            chrome_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct YoutubeSettings {
    /// YouTube Data API v3 key. Falls back to `SNSPULSE_YOUTUBE_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL override, used by tests against a local mock.
    #[serde(default)]
    pub api_base: Option<String>,
}

impl YoutubeSettings {
    pub fn resolve_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(YOUTUBE_API_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Tunables that vary per platform. The "good enough" retry thresholds
/// were hand-tuned in production with no deeper rationale, so they stay
/// configuration rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Concurrent extraction slots.
    pub capacity: usize,

    /// Cool-down jitter bounds after a slot is released, in milliseconds.
    pub cooldown_ms: (u64, u64),

    /// Maximum extraction attempts.
    pub max_attempts: u32,

    /// Early-exit threshold: primary field populated plus this many of
    /// the four post-level fields.
    pub good_enough_post_fields: u32,

    /// Extra caller-side pacing between bulk dispatches, for platforms
    /// that punish bursts even below the concurrency cap.
    #[serde(default)]
    pub paced_dispatch_ms: Option<(u64, u64)>,
}

impl Settings {
    /// Load from a TOML file, or defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("snspulse").join("config.toml"))
    }

    /// Cookie storage directory, creating nothing.
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("snspulse")
                .join("sessions")
        })
    }

    pub fn platform(&self, platform: Platform) -> PlatformSettings {
        self.platforms
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformSettings::defaults_for(platform))
    }

    pub fn slot_wait(&self) -> Duration {
        Duration::from_secs(self.slot_wait_secs)
    }
}

impl PlatformSettings {
    pub fn defaults_for(platform: Platform) -> Self {
        match platform {
            Platform::Tiktok => Self {
                capacity: 2,
                cooldown_ms: (2_000, 4_000),
                max_attempts: 3,
                good_enough_post_fields: 3,
                paced_dispatch_ms: Some((1_000, 3_000)),
            },
            Platform::Instagram => Self {
                capacity: 1,
                cooldown_ms: (3_000, 5_000),
                max_attempts: 2,
                good_enough_post_fields: 2,
                paced_dispatch_ms: None,
            },
            Platform::Facebook => Self {
                capacity: 1,
                cooldown_ms: (3_000, 5_000),
                max_attempts: 2,
                good_enough_post_fields: 2,
                paced_dispatch_ms: None,
            },
            // Official API, no anti-bot concerns.
            Platform::Youtube => Self {
                capacity: 4,
                cooldown_ms: (0, 0),
                max_attempts: 2,
                good_enough_post_fields: 3,
                paced_dispatch_ms: None,
            },
        }
    }

    pub fn cooldown(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.cooldown_ms.0),
            Duration::from_millis(self.cooldown_ms.1),
        )
    }
}

fn default_headless() -> bool {
    true
}

fn default_nav_timeout() -> u64 {
    30
}

fn default_slot_wait_secs() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::default();
        assert!(settings.browser.headless);
        assert_eq!(settings.platform(Platform::Tiktok).capacity, 2);
        assert_eq!(settings.platform(Platform::Instagram).capacity, 1);
        assert_eq!(settings.slot_wait(), Duration::from_secs(120));
    }

    #[test]
    fn test_toml_override() {
        let settings: Settings = toml::from_str(
            r#"
            slot_wait_secs = 10

            [browser]
            headless = false

            [platforms.tiktok]
            capacity = 1
            cooldown_ms = [500, 900]
            max_attempts = 5
            good_enough_post_fields = 4
            "#,
        )
        .unwrap();
        assert!(!settings.browser.headless);
        let tiktok = settings.platform(Platform::Tiktok);
        assert_eq!(tiktok.capacity, 1);
        assert_eq!(tiktok.max_attempts, 5);
        // Unconfigured platforms keep their defaults.
        assert_eq!(settings.platform(Platform::Youtube).capacity, 4);
    }
}
