//! Instagram extraction through a persisted login session.
//!
//! Anonymous Instagram traffic gets an interstitial, so this strategy
//! requires a stored session. A redirect to the login page means the
//! session went stale; that aborts early with an all-null snapshot
//! flagged session-expired, which is logged distinctly from ordinary
//! parse misses so operators know re-login (not markup drift) is needed.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::browser::{Driver, PageContext};
use crate::model::{Platform, Snapshot};
use crate::normalize::{parse_date, parse_magnitude};
use crate::session::SessionStore;
use crate::Result;

use super::fields::{first_hit, labeled_count, select_attr, select_text, Strategy};
use super::Extractor;

pub struct InstagramExtractor {
    driver: Arc<dyn Driver>,
    sessions: Arc<SessionStore>,
}

impl InstagramExtractor {
    pub fn new(driver: Arc<dyn Driver>, sessions: Arc<SessionStore>) -> Self {
        Self { driver, sessions }
    }

    fn profile_url(username: &str) -> String {
        format!(
            "https://www.instagram.com/{}/",
            username.trim_start_matches('@')
        )
    }

    async fn run(&self, ctx: &mut dyn PageContext, username: &str) -> Result<Snapshot> {
        let mut snap = Snapshot::empty(Platform::Instagram, username);

        let landed = ctx.current_url().await?;
        if is_login_redirect(&landed) {
            warn!(%username, "instagram session rejected (login redirect), re-login required");
            return Ok(Snapshot::session_expired(Platform::Instagram, username));
        }

        let html = ctx.content().await?;
        snap.followers = first_hit("followers", html.as_str(), &FOLLOWER_STRATEGIES);

        if let Some(link) = first_post_link(&html) {
            debug!(%link, "opening first post");
            ctx.goto(&link).await?;

            let landed = ctx.current_url().await?;
            if is_login_redirect(&landed) {
                warn!(%username, "instagram session expired mid-extraction");
                snap.session = crate::model::SessionState::Expired;
                return Ok(snap);
            }

            let post_html = ctx.content().await?;
            snap.last_post_date = post_date(&post_html);
            snap.last_post_likes = first_hit("likes", post_html.as_str(), &LIKE_STRATEGIES);
            // Views exist only for video posts; saves are never exposed.
            snap.last_post_views = labeled_count(&post_html, &["조회", "views"]);
        }

        Ok(snap)
    }
}

#[async_trait::async_trait]
impl Extractor for InstagramExtractor {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn extract(&self, username: &str) -> Result<Snapshot> {
        // NoSession surfaces immediately; retrying cannot help.
        let mut ctx = self
            .sessions
            .with_session(
                self.driver.as_ref(),
                Platform::Instagram,
                &Self::profile_url(username),
            )
            .await?;
        let out = self.run(ctx.as_mut(), username).await;
        ctx.close().await;
        out
    }
}

/// Login-page markers are Instagram-specific knowledge, which is why the
/// session store leaves redirect detection to this extractor.
pub(crate) fn is_login_redirect(url: &str) -> bool {
    url.contains("/accounts/login") || url.contains("instagram.com/login")
}

const FOLLOWER_STRATEGIES: [Strategy<str, i64>; 3] = [
    Strategy {
        name: "shared-data-json",
        run: |html| {
            let re = regex::Regex::new(r#""edge_followed_by"\s*:\s*\{\s*"count"\s*:\s*(\d+)"#)
                .ok()?;
            re.captures(html)?.get(1)?.as_str().parse().ok()
        },
    },
    Strategy {
        name: "og-description",
        run: |html| {
            let content = select_attr(html, r#"meta[property="og:description"]"#, "content")?;
            // "1,234 Followers, 56 Following, 78 Posts - ..."
            let re = regex::Regex::new(r"([\d.,]+[KkMm만천억]?)\s*(Followers|팔로워)").ok()?;
            parse_magnitude(re.captures(&content)?.get(1)?.as_str())
        },
    },
    Strategy {
        name: "dom-label-scan",
        run: |html| labeled_count(html, &["팔로워", "Followers", "followers"]),
    },
];

const LIKE_STRATEGIES: [Strategy<str, i64>; 2] = [
    Strategy {
        name: "preview-like-json",
        run: |html| {
            let re =
                regex::Regex::new(r#""edge_media_preview_like"\s*:\s*\{\s*"count"\s*:\s*(\d+)"#)
                    .ok()?;
            re.captures(html)?.get(1)?.as_str().parse().ok()
        },
    },
    Strategy {
        name: "dom-label-scan",
        run: |html| labeled_count(html, &["좋아요", "likes", "like"]),
    },
];

/// First grid anchor that is not a pinned post.
fn first_post_link(html: &str) -> Option<String> {
    use scraper::{Html, Selector};
    let doc = Html::parse_document(html);
    let selector = Selector::parse(r#"a[href^="/p/"], a[href^="/reel/"]"#).ok()?;

    for anchor in doc.select(&selector) {
        let inner = anchor.inner_html();
        if inner.contains("Pinned") || inner.contains("고정됨") {
            continue;
        }
        let href = anchor.value().attr("href")?;
        return Some(if href.starts_with("http") {
            href.to_string()
        } else {
            format!("https://www.instagram.com{href}")
        });
    }
    None
}

/// Post date from the `<time datetime>` attribute, falling back to the
/// element's relative text ("3일 전").
fn post_date(html: &str) -> Option<chrono::NaiveDate> {
    if let Some(datetime) = select_attr(html, "time[datetime]", "datetime") {
        if let Some(date) = parse_date(&datetime) {
            return Some(date);
        }
    }
    select_text(html, "time").as_deref().and_then(parse_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect_detection() {
        assert!(is_login_redirect(
            "https://www.instagram.com/accounts/login/?next=%2Ftester%2F"
        ));
        assert!(!is_login_redirect("https://www.instagram.com/tester/"));
    }

    #[test]
    fn test_followers_from_shared_data() {
        let html = r#"<script>{"edge_followed_by":{"count":4321}}</script>"#;
        assert_eq!(first_hit("followers", html, &FOLLOWER_STRATEGIES), Some(4321));
    }

    #[test]
    fn test_followers_from_og_description() {
        let html = r#"<meta property="og:description"
            content="1.2만 Followers, 10 Following, 42 Posts">"#;
        assert_eq!(
            first_hit("followers", html, &FOLLOWER_STRATEGIES),
            Some(12_000)
        );
    }

    #[test]
    fn test_first_post_link_skips_pinned() {
        let html = r#"
            <a href="/p/pinned1/"><svg aria-label="Pinned post icon">Pinned</svg></a>
            <a href="/p/recent2/"><img></a>
        "#;
        assert_eq!(
            first_post_link(html),
            Some("https://www.instagram.com/p/recent2/".to_string())
        );
    }

    #[test]
    fn test_post_date_from_datetime_attr() {
        let html = r#"<time datetime="2025-01-15T08:00:00.000Z">January 15</time>"#;
        assert_eq!(
            post_date(html),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 15)
        );
    }
}
