//! Per-context fingerprint profiles.
//!
//! Each browsing context draws a user agent and viewport from fixed pools
//! so that concurrent contexts do not all present identical fingerprints.

use rand::prelude::*;

use crate::model::StoredCookie;

/// Real desktop Chrome/Firefox user agents.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Common desktop viewport sizes.
const VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1680, 1050),
    (1536, 864),
    (1440, 900),
    (1366, 768),
];

/// Settings for one isolated browsing context.
#[derive(Debug, Clone)]
pub struct ContextProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub accept_language: String,
    /// Cookies injected before navigation (login session reconstruction).
    pub cookies: Vec<StoredCookie>,
}

impl ContextProfile {
    /// Draw a randomized profile from the pools.
    pub fn randomized() -> Self {
        let mut rng = rand::rng();
        Self {
            user_agent: USER_AGENTS
                .choose(&mut rng)
                .copied()
                .unwrap_or(USER_AGENTS[0])
                .to_string(),
            viewport: VIEWPORTS.choose(&mut rng).copied().unwrap_or((1920, 1080)),
            accept_language: "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<StoredCookie>) -> Self {
        self.cookies = cookies;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_randomized_draws_from_pools() {
        for _ in 0..32 {
            let profile = ContextProfile::randomized();
            assert!(USER_AGENTS.contains(&profile.user_agent.as_str()));
            assert!(VIEWPORTS.contains(&profile.viewport));
            assert!(profile.cookies.is_empty());
        }
    }
}
