//! Facebook extraction: hybrid HTTP + authenticated browser.
//!
//! The public page HTML usually carries the follower count, so that half
//! runs over plain HTTP with no browser at all. Post-level fields need a
//! logged-in pass. Either half may fail without blocking the other; a
//! stale session costs only the post fields.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::browser::{Driver, PageContext};
use crate::model::{Platform, SessionState, Snapshot};
use crate::normalize::parse_date;
use crate::session::SessionStore;
use crate::Result;

use super::fields::{first_hit, labeled_count, select_text, Strategy};
use super::Extractor;

pub struct FacebookExtractor {
    client: reqwest::Client,
    driver: Arc<dyn Driver>,
    sessions: Arc<SessionStore>,
    page_base: String,
}

impl FacebookExtractor {
    pub fn new(
        client: reqwest::Client,
        driver: Arc<dyn Driver>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            client,
            driver,
            sessions,
            page_base: "https://www.facebook.com".to_string(),
        }
    }

    /// Page base URL override, used by tests against a local mock.
    pub fn with_page_base(mut self, base: impl Into<String>) -> Self {
        self.page_base = base.into();
        self
    }

    fn page_url(&self, username: &str) -> String {
        format!("{}/{}", self.page_base, username.trim_start_matches('@'))
    }

    /// Follower count over plain HTTP. Failures degrade to `None`; this
    /// half must never take the browser half down with it.
    async fn fetch_followers(&self, username: &str) -> Option<i64> {
        let url = self.page_url(username);
        let response = match self
            .client
            .get(&url)
            .header(
                reqwest::header::USER_AGENT,
                crate::browser::profile::ContextProfile::randomized().user_agent,
            )
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(%url, "facebook http fetch failed: {e}");
                return None;
            }
        };
        let html = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                debug!(%url, "facebook http body failed: {e}");
                return None;
            }
        };
        first_hit("followers", html.as_str(), &FOLLOWER_STRATEGIES)
    }

    /// Post-level fields through the stored session, when one exists.
    async fn fetch_post_fields(&self, username: &str, snap: &mut Snapshot) -> Result<()> {
        let mut ctx = self
            .sessions
            .with_session(
                self.driver.as_ref(),
                Platform::Facebook,
                &self.page_url(username),
            )
            .await?;
        let out = self.scan_posts(ctx.as_mut(), snap).await;
        ctx.close().await;
        out
    }

    async fn scan_posts(&self, ctx: &mut dyn PageContext, snap: &mut Snapshot) -> Result<()> {
        let landed = ctx.current_url().await?;
        if is_login_redirect(&landed) {
            warn!(username = %snap.username, "facebook session rejected, re-login required");
            snap.session = SessionState::Expired;
            return Ok(());
        }

        let html = ctx.content().await?;
        snap.last_post_date = first_post_date(&html);
        snap.last_post_likes = labeled_count(&html, &["좋아요", "likes", "Like"]);
        snap.last_post_views = labeled_count(&html, &["조회", "views"]);
        // Saves are not surfaced anywhere on the page.
        Ok(())
    }
}

#[async_trait::async_trait]
impl Extractor for FacebookExtractor {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn extract(&self, username: &str) -> Result<Snapshot> {
        let mut snap = Snapshot::empty(Platform::Facebook, username);

        snap.followers = self.fetch_followers(username).await;

        if self.sessions.has_session(Platform::Facebook) {
            // A browser-half failure must not take the HTTP half down
            // with it; the follower count already in the snapshot stays.
            if let Err(e) = self.fetch_post_fields(username, &mut snap).await {
                if !e.is_retryable() {
                    return Err(e);
                }
                warn!(%username, error = %e, "facebook post-field pass failed, keeping follower count");
            }
        } else {
            debug!(%username, "no facebook session, skipping post fields");
        }

        Ok(snap)
    }
}

pub(crate) fn is_login_redirect(url: &str) -> bool {
    url.contains("facebook.com/login") || url.contains("/login.php")
}

const FOLLOWER_STRATEGIES: [Strategy<str, i64>; 2] = [
    Strategy {
        name: "ssr-follower-count",
        run: |html| {
            let re = regex::Regex::new(r#""follower_count"\s*:\s*(\d+)"#).ok()?;
            re.captures(html)?.get(1)?.as_str().parse().ok()
        },
    },
    Strategy {
        name: "dom-label-scan",
        run: |html| labeled_count(html, &["팔로워", "followers", "Followers"]),
    },
];

/// Timestamp of the newest feed entry: an `<abbr>`/`<time>` element or
/// relative text near the top of the first article.
fn first_post_date(html: &str) -> Option<chrono::NaiveDate> {
    if let Some(text) = select_text(html, "abbr") {
        if let Some(date) = parse_date(&text) {
            return Some(date);
        }
    }
    select_text(html, "time").as_deref().and_then(parse_date)
}
