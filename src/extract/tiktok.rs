//! TikTok extraction: anonymous SSR-JSON-first, DOM fallback.
//!
//! Profile pages ship a `SIGI_STATE` script blob with user stats and the
//! post list; when fields are missing there the rendered DOM is scanned
//! by `data-e2e` markers and locale labels. The first non-pinned post
//! supplies the post-level fields, with a detail-page pass as a last
//! resort.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::browser::{ContextProfile, Driver, PageContext};
use crate::model::{Platform, Snapshot};
use crate::normalize::{date_from_epoch_secs, parse_magnitude};
use crate::Result;

use super::fields::{
    embedded_json, first_hit, json_count, labeled_count, merge_missing, prefer_nonzero,
    select_text, Strategy,
};
use super::Extractor;

pub struct TiktokExtractor {
    driver: Arc<dyn Driver>,
}

impl TiktokExtractor {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    fn profile_url(username: &str) -> String {
        format!("https://www.tiktok.com/@{}", username.trim_start_matches('@'))
    }

    async fn run(&self, ctx: &mut dyn PageContext, username: &str) -> Result<Snapshot> {
        let mut snap = Snapshot::empty(Platform::Tiktok, username);

        ctx.goto(&Self::profile_url(username)).await?;
        let html = ctx.content().await?;

        let doc = ProfileDoc {
            html: &html,
            username,
        };
        snap.followers = first_hit("followers", &doc, &follower_strategies());

        let state = embedded_json(&html, "SIGI_STATE");
        if let Some(post) = state.as_ref().and_then(latest_unpinned_post) {
            snap.last_post_date = post.create_time.and_then(date_from_epoch_secs);
            snap.last_post_views = post.views;
            snap.last_post_likes = post.likes;
            snap.last_post_saves = post.saves;
        }

        // List view sometimes renders view counts the JSON omits.
        let list_views = select_text(&html, r#"strong[data-e2e="video-views"]"#)
            .as_deref()
            .and_then(parse_magnitude);
        snap.last_post_views = prefer_nonzero(snap.last_post_views, list_views);

        // Detail-page pass when post-level fields are still missing.
        if snap.post_field_count() < 2 {
            if let Some(link) = first_post_link(&html) {
                debug!(%link, "falling back to post detail page");
                ctx.goto(&link).await?;
                let detail = ctx.content().await?;
                fill_from_detail(&mut snap, &detail);
            }
        }

        Ok(snap)
    }
}

#[async_trait::async_trait]
impl Extractor for TiktokExtractor {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn extract(&self, username: &str) -> Result<Snapshot> {
        let mut ctx = self
            .driver
            .new_context(ContextProfile::randomized())
            .await?;
        let out = self.run(ctx.as_mut(), username).await;
        ctx.close().await;
        out
    }
}

struct ProfileDoc<'a> {
    html: &'a str,
    username: &'a str,
}

/// Follower fallback chain: SSR JSON, then the `data-e2e` counter, then a
/// locale-label text scan.
fn follower_strategies<'a>() -> [Strategy<ProfileDoc<'a>, i64>; 3] {
    [
        Strategy {
            name: "sigi-state-json",
            run: |doc| {
                let state = embedded_json(doc.html, "SIGI_STATE")?;
                followers_from_state(&state, doc.username)
            },
        },
        Strategy {
            name: "dom-followers-count",
            run: |doc| {
                select_text(doc.html, r#"strong[data-e2e="followers-count"]"#)
                    .as_deref()
                    .and_then(parse_magnitude)
            },
        },
        Strategy {
            name: "dom-label-scan",
            run: |doc| labeled_count(doc.html, &["팔로워", "Followers"]),
        },
    ]
}

fn followers_from_state(state: &Value, username: &str) -> Option<i64> {
    let stats = state.get("UserModule")?.get("stats")?;
    let user_stats = stats
        .get(username)
        .or_else(|| stats.get(username.to_lowercase().as_str()))
        .or_else(|| stats.as_object()?.values().next())?;
    json_count(user_stats.get("followerCount")?)
}

struct SigiPost {
    create_time: Option<i64>,
    views: Option<i64>,
    likes: Option<i64>,
    saves: Option<i64>,
}

/// Most recent non-pinned entry of `ItemModule`.
fn latest_unpinned_post(state: &Value) -> Option<SigiPost> {
    let items = state.get("ItemModule")?.as_object()?;

    let mut best: Option<(i64, &Value)> = None;
    for item in items.values() {
        let pinned = item
            .get("isPinnedItem")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if pinned {
            continue;
        }
        let created = item
            .get("createTime")
            .and_then(json_count)
            .unwrap_or(0);
        if best.map(|(t, _)| created > t).unwrap_or(true) {
            best = Some((created, item));
        }
    }

    let (created, item) = best?;
    let stats = item.get("stats");
    let stat = |key: &str| stats.and_then(|s| s.get(key)).and_then(json_count);
    Some(SigiPost {
        create_time: (created > 0).then_some(created),
        views: stat("playCount"),
        likes: stat("diggCount"),
        saves: stat("collectCount"),
    })
}

/// First video link on the profile grid.
fn first_post_link(html: &str) -> Option<String> {
    let href = super::fields::select_attr(html, r#"div[data-e2e="user-post-item"] a"#, "href")
        .or_else(|| super::fields::select_attr(html, r#"a[href*="/video/"]"#, "href"))?;
    if href.starts_with("http") {
        Some(href)
    } else {
        Some(format!("https://www.tiktok.com{href}"))
    }
}

/// Detail pages carry their own SIGI blob plus rendered counters.
fn fill_from_detail(snap: &mut Snapshot, html: &str) {
    if let Some(post) = embedded_json(html, "SIGI_STATE")
        .as_ref()
        .and_then(latest_unpinned_post)
    {
        merge_missing(
            &mut snap.last_post_date,
            post.create_time.and_then(date_from_epoch_secs),
        );
        snap.last_post_views = prefer_nonzero(snap.last_post_views, post.views);
        merge_missing(&mut snap.last_post_likes, post.likes);
        merge_missing(&mut snap.last_post_saves, post.saves);
    }

    let dom_likes = select_text(html, r#"strong[data-e2e="like-count"]"#)
        .as_deref()
        .and_then(parse_magnitude);
    merge_missing(&mut snap.last_post_likes, dom_likes);

    let dom_saves = select_text(html, r#"strong[data-e2e="undefined-count"]"#)
        .as_deref()
        .and_then(parse_magnitude);
    merge_missing(&mut snap.last_post_saves, dom_saves);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sigi_fixture() -> String {
        r#"<html><body>
        <script id="SIGI_STATE" type="application/json">{
            "UserModule": {"stats": {"tester": {"followerCount": 1500}}},
            "ItemModule": {
                "111": {"isPinnedItem": true, "createTime": "1710000000",
                        "stats": {"playCount": 9000, "diggCount": 100}},
                "222": {"createTime": "1700000000",
                        "stats": {"playCount": 42}}
            }
        }</script>
        </body></html>"#
            .to_string()
    }

    #[test]
    fn test_followers_from_state() {
        let state = embedded_json(&sigi_fixture(), "SIGI_STATE").unwrap();
        assert_eq!(followers_from_state(&state, "tester"), Some(1500));
        // Unknown username falls back to the first stats entry.
        assert_eq!(followers_from_state(&state, "other"), Some(1500));
    }

    #[test]
    fn test_latest_unpinned_post_skips_pinned() {
        let state = embedded_json(&sigi_fixture(), "SIGI_STATE").unwrap();
        let post = latest_unpinned_post(&state).unwrap();
        // The pinned post is newer but must be ignored.
        assert_eq!(post.views, Some(42));
        assert_eq!(post.create_time, Some(1_700_000_000));
        assert_eq!(post.likes, None);
        assert_eq!(post.saves, None);
    }

    #[test]
    fn test_first_post_link_absolute() {
        let html = r#"<div data-e2e="user-post-item"><a href="/@tester/video/123"></a></div>"#;
        assert_eq!(
            first_post_link(html),
            Some("https://www.tiktok.com/@tester/video/123".to_string())
        );
    }

    #[test]
    fn test_dom_fallback_never_overwrites_json_values() {
        let mut snap = Snapshot::empty(Platform::Tiktok, "tester");
        snap.last_post_likes = Some(10);
        let html = r#"<strong data-e2e="like-count">999</strong>"#;
        fill_from_detail(&mut snap, html);
        assert_eq!(snap.last_post_likes, Some(10));
    }
}
