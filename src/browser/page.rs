//! Concrete CDP-backed browsing context.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::{Browser, Page};
use tracing::{debug, warn};

use super::{transport_err, ContextProfile, PageContext};
use crate::error::Error;
use crate::Result;

/// Resolves once the document is interactive, with its own fallback so
/// the promise cannot hang forever.
const READY_STATE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// A live page plus the profile it was configured with.
pub struct CdpContext {
    page: Page,
    nav_timeout: Duration,
    last_url: String,
    closed: bool,
}

impl CdpContext {
    /// Open a fresh page on `browser`, applying the profile's user agent,
    /// viewport, stealth scripts and cookies before any navigation.
    pub(crate) async fn open(
        browser: &Browser,
        profile: ContextProfile,
        nav_timeout_secs: u64,
    ) -> Result<Self> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(format!("new page: {e}")))?;

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(profile.user_agent.clone())
            .accept_language(profile.accept_language.clone())
            .build()
            .map_err(|e| Error::Browser(format!("user agent override: {e}")))?;
        page.execute(ua)
            .await
            .map_err(|e| Error::Browser(format!("user agent override: {e}")))?;

        let (width, height) = profile.viewport;
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| Error::Browser(format!("viewport override: {e}")))?;
        page.execute(metrics)
            .await
            .map_err(|e| Error::Browser(format!("viewport override: {e}")))?;

        // Fingerprint masking must be registered before the first real
        // navigation; scripts added here run at document start.
        for script in super::stealth::STEALTH_SCRIPTS {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                script.to_string(),
            ))
            .await
            .map_err(|e| Error::Browser(format!("stealth install: {e}")))?;
        }

        for cookie in &profile.cookies {
            let param = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(&cookie.path)
                .build();
            match param {
                Ok(param) => {
                    if let Err(e) = page.set_cookie(param).await {
                        warn!(cookie = %cookie.name, "failed to inject cookie: {e}");
                    }
                }
                Err(e) => {
                    warn!(cookie = %cookie.name, "failed to build cookie: {e}");
                }
            }
        }

        Ok(Self {
            page,
            nav_timeout: Duration::from_secs(nav_timeout_secs),
            last_url: String::new(),
            closed: false,
        })
    }
}

#[async_trait]
impl PageContext for CdpContext {
    async fn goto(&mut self, url: &str) -> Result<()> {
        debug!(%url, "navigating");
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| transport_err("navigate params", e))?;

        tokio::time::timeout(self.nav_timeout, self.page.execute(params))
            .await
            .map_err(|_| Error::Transport(format!("navigation timeout: {url}")))?
            .map_err(|e| transport_err("navigate", e))?;

        // Best-effort wait for the document to settle; failures here are
        // not fatal (the page may still be usable).
        match tokio::time::timeout(
            self.nav_timeout,
            self.page.evaluate(READY_STATE_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result.into_value().unwrap_or_else(|_| "unknown".to_string());
                debug!(%state, "page ready");
            }
            Ok(Err(e)) => debug!("ready-state check failed: {e}"),
            Err(_) => warn!(%url, "timeout waiting for page ready state"),
        }

        // Late-rendering content (hydration) needs a beat to land.
        tokio::time::sleep(Duration::from_millis(500)).await;

        self.last_url = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| transport_err("current url", e))?;
        Ok(url
            .map(|u| u.to_string())
            .unwrap_or_else(|| self.last_url.clone()))
    }

    async fn content(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| transport_err("page content", e))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.page.clone().close().await;
        }
    }
}
