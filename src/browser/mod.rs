//! Shared browser lifecycle and isolated browsing contexts.
//!
//! One stealth-configured Chromium process is shared by all extractions;
//! each extraction gets its own disposable page context (cookies, user
//! agent, viewport). The process lifecycle is an explicit state machine,
//! `Unstarted -> Running -> Disconnected`, and a disconnect is healed by
//! relaunching on the next acquire. Contexts created on a dead process
//! surface ordinary transport errors to their callers.

#[cfg(feature = "browser")]
mod page;
pub mod profile;
pub mod stealth;

use async_trait::async_trait;

pub use profile::ContextProfile;

use crate::error::Error;
use crate::Result;

#[cfg(feature = "browser")]
pub use page::CdpContext;

/// One isolated, disposable browsing context. Owned exclusively by the
/// extraction call that created it; must be closed on every exit path.
#[async_trait]
pub trait PageContext: Send {
    /// Navigate and wait for the document to settle, within the
    /// configured timeout.
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// URL the page ended up on (after redirects).
    async fn current_url(&mut self) -> Result<String>;

    /// Rendered HTML of the current document.
    async fn content(&mut self) -> Result<String>;

    /// Release the context. Idempotent.
    async fn close(&mut self);
}

/// Factory seam for browsing contexts. Extractors depend on this trait so
/// tests can substitute a fake that serves fixture pages and counts
/// open/close pairs.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn new_context(&self, profile: ContextProfile) -> Result<Box<dyn PageContext>>;
}

#[cfg(feature = "browser")]
pub use real::BrowserPool;

#[cfg(feature = "browser")]
mod real {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tokio::sync::Mutex;
    use tracing::{info, warn};

    use super::page::CdpContext;
    use super::{ContextProfile, Driver, PageContext};
    use crate::config::BrowserSettings;
    use crate::error::Error;
    use crate::Result;

    /// Lifecycle of the shared scraping browser.
    enum PoolState {
        Unstarted,
        Running {
            browser: Arc<Browser>,
            alive: Arc<AtomicBool>,
        },
        Disconnected,
    }

    /// Owns the shared stealth browser process and hands out isolated
    /// page contexts.
    pub struct BrowserPool {
        settings: BrowserSettings,
        state: Mutex<PoolState>,
    }

    impl BrowserPool {
        /// Common Chrome executable locations, checked in order.
        const CHROME_PATHS: &'static [&'static str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/google/chrome/google-chrome",
        ];

        pub fn new(settings: BrowserSettings) -> Self {
            Self {
                settings,
                state: Mutex::new(PoolState::Unstarted),
            }
        }

        /// Locate a Chrome/Chromium executable.
        pub(crate) fn find_chrome(configured: Option<&PathBuf>) -> Result<PathBuf> {
            if let Some(path) = configured {
                if path.exists() {
                    return Ok(path.clone());
                }
                return Err(Error::Browser(format!(
                    "configured chrome path does not exist: {}",
                    path.display()
                )));
            }

            for path in Self::CHROME_PATHS {
                let p = std::path::Path::new(path);
                if p.exists() {
                    return Ok(p.to_path_buf());
                }
            }

            for cmd in &[
                "google-chrome",
                "google-chrome-stable",
                "chromium",
                "chromium-browser",
            ] {
                if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                    if output.status.success() {
                        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                        if !path.is_empty() {
                            return Ok(PathBuf::from(path));
                        }
                    }
                }
            }

            Err(Error::Browser(
                "Chrome/Chromium not found; install it or set browser.chrome_path".to_string(),
            ))
        }

        /// Launch a browser with the stealth flag set applied.
        pub(crate) async fn launch_stealth(
            settings: &BrowserSettings,
            headless: bool,
        ) -> Result<(Browser, Arc<AtomicBool>)> {
            let chrome_path = Self::find_chrome(settings.chrome_path.as_ref())?;
            info!(path = %chrome_path.display(), headless, "launching browser");

            let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
            if !headless {
                builder = builder.with_head();
            }
            for arg in super::stealth::CHROME_ARGS {
                builder = builder.arg(*arg);
            }
            for arg in &settings.chrome_args {
                builder = builder.arg(arg);
            }

            let config = builder
                .build()
                .map_err(|e| Error::Browser(format!("browser config: {e}")))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| Error::Browser(format!("launch: {e}")))?;

            let alive = Arc::new(AtomicBool::new(true));
            let alive_flag = alive.clone();
            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
                warn!("browser CDP channel closed");
                alive_flag.store(false, Ordering::SeqCst);
            });

            Ok((browser, alive))
        }

        /// Return the running browser, lazily launching or relaunching.
        async fn acquire(&self) -> Result<Arc<Browser>> {
            let mut state = self.state.lock().await;

            if let PoolState::Running { browser, alive } = &*state {
                if alive.load(Ordering::SeqCst) {
                    return Ok(browser.clone());
                }
                // In-flight contexts on the dead process are lost; their
                // callers see navigation failures as ordinary errors.
                warn!("browser disconnected, will relaunch");
                *state = PoolState::Disconnected;
            }

            let (browser, alive) = Self::launch_stealth(&self.settings, self.settings.headless).await?;
            let browser = Arc::new(browser);
            *state = PoolState::Running {
                browser: browser.clone(),
                alive,
            };
            Ok(browser)
        }
    }

    #[async_trait::async_trait]
    impl Driver for BrowserPool {
        async fn new_context(&self, profile: ContextProfile) -> Result<Box<dyn PageContext>> {
            let browser = self.acquire().await?;
            let ctx = CdpContext::open(&browser, profile, self.settings.nav_timeout_secs).await?;
            Ok(Box::new(ctx))
        }
    }
}

// Stub when browser support is compiled out; the YouTube strategy still
// works, everything browser-driven reports a hard error.
#[cfg(not(feature = "browser"))]
pub use stub::BrowserPool;

#[cfg(not(feature = "browser"))]
mod stub {
    use super::{ContextProfile, Driver, PageContext};
    use crate::config::BrowserSettings;
    use crate::error::Error;
    use crate::Result;

    pub struct BrowserPool;

    impl BrowserPool {
        pub fn new(_settings: BrowserSettings) -> Self {
            Self
        }
    }

    #[async_trait::async_trait]
    impl Driver for BrowserPool {
        async fn new_context(&self, _profile: ContextProfile) -> Result<Box<dyn PageContext>> {
            Err(Error::Browser(
                "browser support not compiled; rebuild with --features browser".to_string(),
            ))
        }
    }
}

/// Map a navigation-layer failure into a retryable transport error.
pub(crate) fn transport_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Transport(format!("{context}: {err}"))
}
