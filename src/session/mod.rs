//! Persisted login sessions.
//!
//! A login flow opens a visible browser, the operator signs in by hand,
//! and closing the flow captures the cookies to disk (one JSON file per
//! platform). Authenticated extractions rebuild a browsing context from
//! those cookies. Freshness is never validated here; a stale session
//! shows up behaviorally as a login-page redirect, which extractors
//! detect because the markers are platform-specific.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::browser::{ContextProfile, Driver, PageContext};
use crate::error::Error;
use crate::model::{Platform, StoredCookie};
use crate::Result;

/// Login entry points for the session-gated platforms.
fn login_url(platform: Platform) -> Result<&'static str> {
    match platform {
        Platform::Instagram => Ok("https://www.instagram.com/accounts/login/"),
        Platform::Facebook => Ok("https://www.facebook.com/login"),
        other => Err(Error::Config(format!(
            "{other} has no manual login flow"
        ))),
    }
}

/// Durable cookie store plus tracking of open manual-login browsers.
pub struct SessionStore {
    dir: PathBuf,
    #[cfg(feature = "browser")]
    login: tokio::sync::Mutex<std::collections::HashMap<Platform, login::LoginInstance>>,
    #[cfg(feature = "browser")]
    browser_settings: crate::config::BrowserSettings,
}

impl SessionStore {
    pub fn new(dir: PathBuf, #[allow(unused)] browser_settings: crate::config::BrowserSettings) -> Self {
        Self {
            dir,
            #[cfg(feature = "browser")]
            login: tokio::sync::Mutex::new(std::collections::HashMap::new()),
            #[cfg(feature = "browser")]
            browser_settings,
        }
    }

    fn cookie_path(&self, platform: Platform) -> PathBuf {
        self.dir.join(format!("{platform}.json"))
    }

    /// Whether a persisted session exists. Existence only; no freshness
    /// check.
    pub fn has_session(&self, platform: Platform) -> bool {
        self.cookie_path(platform).exists()
    }

    /// Read the persisted cookie set, or `NoSession`.
    pub fn load_cookies(&self, platform: Platform) -> Result<Vec<StoredCookie>> {
        let path = self.cookie_path(platform);
        if !path.exists() {
            return Err(Error::NoSession(platform));
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::SessionStorage)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist a cookie set, replacing any previous one.
    pub fn save_cookies(&self, platform: Platform, cookies: &[StoredCookie]) -> Result<()> {
        let path = self.cookie_path(platform);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::SessionStorage)?;
        }
        let json = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&path, json).map_err(Error::SessionStorage)?;
        info!(%platform, count = cookies.len(), path = %path.display(), "saved login session");
        Ok(())
    }

    /// Build an authenticated context and navigate it to `url`.
    ///
    /// Callers own the returned context and must close it on every exit
    /// path. A login redirect on the resulting page is the caller's to
    /// detect.
    pub async fn with_session(
        &self,
        driver: &dyn Driver,
        platform: Platform,
        url: &str,
    ) -> Result<Box<dyn PageContext>> {
        let cookies = self.load_cookies(platform)?;
        let profile = ContextProfile::randomized().with_cookies(cookies);
        let mut ctx = driver.new_context(profile).await?;
        if let Err(e) = ctx.goto(url).await {
            ctx.close().await;
            return Err(e);
        }
        Ok(ctx)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(feature = "browser")]
mod login {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use chromiumoxide::Browser;
    use tracing::{info, warn};

    use super::{login_url, SessionStore};
    use crate::browser::BrowserPool;
    use crate::error::Error;
    use crate::model::{Platform, StoredCookie};
    use crate::Result;

    pub(super) struct LoginInstance {
        pub(super) browser: Browser,
        #[allow(dead_code)]
        pub(super) alive: Arc<AtomicBool>,
    }

    impl SessionStore {
        /// Open a visible browser at the platform's login page. At most
        /// one open login flow per platform; a prior one is closed first.
        pub async fn open_login(&self, platform: Platform) -> Result<()> {
            let url = login_url(platform)?;
            let mut tracked = self.login.lock().await;

            if let Some(mut previous) = tracked.remove(&platform) {
                warn!(%platform, "closing previously open login browser");
                let _ = previous.browser.close().await;
            }

            let (browser, alive) =
                BrowserPool::launch_stealth(&self.browser_settings, false).await?;
            browser
                .new_page(url)
                .await
                .map_err(|e| Error::Browser(format!("open login page: {e}")))?;

            info!(%platform, %url, "login browser opened");
            tracked.insert(platform, LoginInstance { browser, alive });
            Ok(())
        }

        /// Capture cookies from the tracked login browser, persist them,
        /// then terminate the instance. Cleanup is unconditional: the
        /// browser is closed even when the cookie read fails, and the
        /// failure is surfaced afterwards.
        pub async fn close_login(&self, platform: Platform) -> Result<()> {
            let mut instance = {
                let mut tracked = self.login.lock().await;
                tracked
                    .remove(&platform)
                    .ok_or_else(|| Error::Config(format!("no open login browser for {platform}")))?
            };

            let captured = instance.browser.get_cookies().await;
            let _ = instance.browser.close().await;

            let cookies = captured
                .map_err(|e| Error::Browser(format!("reading login cookies: {e}")))?;
            let stored: Vec<StoredCookie> = cookies
                .iter()
                .map(|c| StoredCookie {
                    name: c.name.clone(),
                    value: c.value.clone(),
                    domain: c.domain.clone(),
                    path: c.path.clone(),
                    expires: Some(c.expires),
                    secure: c.secure,
                    http_only: c.http_only,
                })
                .collect();

            self.save_cookies(platform, &stored)
        }
    }
}

#[cfg(not(feature = "browser"))]
impl SessionStore {
    pub async fn open_login(&self, _platform: Platform) -> Result<()> {
        Err(Error::Browser(
            "browser support not compiled; rebuild with --features browser".to_string(),
        ))
    }

    pub async fn close_login(&self, _platform: Platform) -> Result<()> {
        Err(Error::Browser(
            "browser support not compiled; rebuild with --features browser".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserSettings;

    fn store(dir: &Path) -> SessionStore {
        SessionStore::new(dir.to_path_buf(), BrowserSettings::default())
    }

    fn sample_cookies() -> Vec<StoredCookie> {
        vec![
            StoredCookie {
                name: "sessionid".into(),
                value: "abc123".into(),
                domain: ".instagram.com".into(),
                path: "/".into(),
                expires: Some(1_999_999_999.0),
                secure: true,
                http_only: true,
            },
            StoredCookie {
                name: "csrftoken".into(),
                value: "tok".into(),
                domain: ".instagram.com".into(),
                path: "/".into(),
                expires: None,
                secure: true,
                http_only: false,
            },
        ]
    }

    #[test]
    fn test_has_session_is_existence_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        assert!(!store.has_session(Platform::Instagram));
        store
            .save_cookies(Platform::Instagram, &sample_cookies())
            .unwrap();
        assert!(store.has_session(Platform::Instagram));
        assert!(!store.has_session(Platform::Facebook));
    }

    #[test]
    fn test_cookie_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let cookies = sample_cookies();
        store.save_cookies(Platform::Facebook, &cookies).unwrap();
        assert_eq!(store.load_cookies(Platform::Facebook).unwrap(), cookies);
    }

    #[test]
    fn test_missing_session_is_no_session_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let err = store.load_cookies(Platform::Instagram).unwrap_err();
        assert!(matches!(err, Error::NoSession(Platform::Instagram)));
    }
}
