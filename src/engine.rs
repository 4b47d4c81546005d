//! Extraction engine facade.
//!
//! Wires the governor, browser pool, session store and per-platform
//! extractors behind three boundary operations: `scrape`, the manual
//! login flow, and the session status check. `scrape` never fails for
//! "no data"; after retries are exhausted a transport failure degrades to
//! an all-null snapshot, which callers should present as "nothing could
//! be fetched".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::browser::{BrowserPool, Driver};
use crate::config::Settings;
use crate::error::Error;
use crate::extract::{build_extractors, Extractor};
use crate::governor::Governor;
use crate::model::{Platform, Snapshot};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::session::SessionStore;
use crate::Result;

pub struct Engine {
    settings: Settings,
    governor: Governor,
    sessions: Arc<SessionStore>,
    extractors: HashMap<Platform, Arc<dyn Extractor>>,
}

impl Engine {
    /// Production wiring: shared stealth browser pool and a plain HTTP
    /// client for the API/hybrid strategies.
    pub fn new(settings: Settings) -> Self {
        let driver: Arc<dyn Driver> = Arc::new(BrowserPool::new(settings.browser.clone()));
        Self::with_driver(settings, driver)
    }

    /// Test seam: substitute any context factory for the real browser.
    pub fn with_driver(settings: Settings, driver: Arc<dyn Driver>) -> Self {
        let sessions = Arc::new(SessionStore::new(
            settings.session_dir(),
            settings.browser.clone(),
        ));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.browser.nav_timeout_secs))
            .build()
            .unwrap_or_default();
        let extractors = build_extractors(&settings, driver, sessions.clone(), http);
        Self {
            governor: Governor::new(&settings),
            settings,
            sessions,
            extractors,
        }
    }

    /// Extract metrics for one account. Each attempt takes a governor
    /// slot for the extraction itself and releases it before backing
    /// off, so other accounts on the platform are not blocked for the
    /// backoff window.
    pub async fn scrape(&self, platform: Platform, username: &str) -> Result<Snapshot> {
        let extractor = self
            .extractors
            .get(&platform)
            .cloned()
            .ok_or_else(|| Error::UnknownPlatform(platform.to_string()))?;

        let ps = self.settings.platform(platform);
        let policy = RetryPolicy {
            max_attempts: ps.max_attempts,
            good_enough_post_fields: ps.good_enough_post_fields,
            ..RetryPolicy::default()
        };

        let result = run_with_retry(&policy, |attempt| {
            let extractor = extractor.clone();
            let username = username.to_string();
            let governor = self.governor.clone();
            async move {
                let slot = governor.acquire(platform).await?;
                info!(%platform, %username, attempt, "extraction attempt");
                let outcome = extractor.extract(&username).await;
                drop(slot);
                outcome
            }
        })
        .await;

        match result {
            Ok(snap) => Ok(snap),
            Err(e) if e.is_retryable() => {
                warn!(%platform, %username, error = %e, "all attempts failed, returning empty result");
                Ok(Snapshot::empty(platform, username))
            }
            Err(e) => Err(e),
        }
    }

    /// Bulk refresh. Accounts on uncapped platforms fan out fully in
    /// parallel; platforms marked for paced dispatch additionally get a
    /// randomized caller-side delay between dispatches, layered above the
    /// governor's own throttling.
    pub async fn scrape_many(
        &self,
        accounts: &[(Platform, String)],
    ) -> Vec<Result<Snapshot>> {
        let mut paced: Vec<(usize, Platform, &str)> = Vec::new();
        let mut free: Vec<(usize, Platform, &str)> = Vec::new();
        for (i, (platform, username)) in accounts.iter().enumerate() {
            let pacing = self.settings.platform(*platform).paced_dispatch_ms;
            if pacing.is_some() {
                paced.push((i, *platform, username));
            } else {
                free.push((i, *platform, username));
            }
        }

        let free_run = futures::future::join_all(
            free.iter()
                .map(|&(i, platform, username)| async move {
                    (i, self.scrape(platform, username).await)
                }),
        );

        let paced_run = async {
            let mut out = Vec::new();
            for &(i, platform, username) in &paced {
                if let Some((lo, hi)) = self.settings.platform(platform).paced_dispatch_ms {
                    let ms = if hi > lo {
                        rand::rng().random_range(lo..=hi)
                    } else {
                        lo
                    };
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                out.push((i, self.scrape(platform, username).await));
            }
            out
        };

        let (mut free_results, paced_results) = futures::join!(free_run, paced_run);
        free_results.extend(paced_results);
        free_results.sort_by_key(|(i, _)| *i);
        free_results.into_iter().map(|(_, r)| r).collect()
    }

    /// Open a visible browser for a manual login.
    pub async fn open_login_browser(&self, platform: Platform) -> Result<()> {
        self.sessions.open_login(platform).await
    }

    /// Capture and persist cookies from the open login browser, then
    /// close it. The only writer of persisted session state.
    pub async fn close_login_browser(&self, platform: Platform) -> Result<()> {
        self.sessions.close_login(platform).await
    }

    /// Read-only session existence check.
    pub fn has_login_session(&self, platform: Platform) -> bool {
        self.sessions.has_session(platform)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
