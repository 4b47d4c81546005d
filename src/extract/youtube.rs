//! YouTube extraction via the Data API v3.
//!
//! Deterministic three-step lookup: resolve the handle to a channel, read
//! the newest upload from the uploads playlist, then fetch that video's
//! statistics. No browser, no anti-bot concerns; fails hard only when the
//! API key is absent.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::config::{YoutubeSettings, YOUTUBE_API_KEY_ENV};
use crate::error::Error;
use crate::model::{Platform, Snapshot};
use crate::Result;

use super::fields::json_count;
use super::Extractor;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

pub struct YoutubeExtractor {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl YoutubeExtractor {
    pub fn new(client: reqwest::Client, settings: &YoutubeSettings) -> Self {
        Self {
            client,
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: settings.resolve_key(),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{path}", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("youtube api request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "youtube api {path} returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("youtube api body: {e}")))
    }
}

#[async_trait::async_trait]
impl Extractor for YoutubeExtractor {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn extract(&self, username: &str) -> Result<Snapshot> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(Error::MissingCredential(YOUTUBE_API_KEY_ENV))?;

        let mut snap = Snapshot::empty(Platform::Youtube, username);
        let handle = normalize_handle(username);

        let channels = self
            .get_json(
                "channels",
                &[
                    ("part", "statistics,contentDetails"),
                    ("forHandle", &handle),
                    ("key", key),
                ],
            )
            .await?;
        let Some(channel) = channels["items"].get(0) else {
            debug!(%handle, "no channel for handle");
            return Ok(snap);
        };

        snap.followers = channel["statistics"]
            .get("subscriberCount")
            .and_then(json_count);

        let Some(uploads) = channel["contentDetails"]["relatedPlaylists"]["uploads"].as_str()
        else {
            return Ok(snap);
        };

        let playlist = self
            .get_json(
                "playlistItems",
                &[
                    ("part", "contentDetails"),
                    ("playlistId", uploads),
                    ("maxResults", "1"),
                    ("key", key),
                ],
            )
            .await?;
        let Some(latest) = playlist["items"].get(0) else {
            return Ok(snap);
        };

        snap.last_post_date = latest["contentDetails"]
            .get("videoPublishedAt")
            .and_then(Value::as_str)
            .and_then(published_date);

        let Some(video_id) = latest["contentDetails"]["videoId"].as_str() else {
            return Ok(snap);
        };

        let videos = self
            .get_json(
                "videos",
                &[("part", "statistics"), ("id", video_id), ("key", key)],
            )
            .await?;
        if let Some(stats) = videos["items"].get(0).map(|v| &v["statistics"]) {
            snap.last_post_views = stats.get("viewCount").and_then(json_count);
            snap.last_post_likes = stats.get("likeCount").and_then(json_count);
        }
        // The API exposes no save/bookmark statistic.

        Ok(snap)
    }
}

fn normalize_handle(username: &str) -> String {
    let trimmed = username.trim().trim_start_matches('@');
    format!("@{trimmed}")
}

fn published_date(raw: &str) -> Option<NaiveDate> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("creator"), "@creator");
        assert_eq!(normalize_handle("@creator"), "@creator");
        assert_eq!(normalize_handle("  @creator "), "@creator");
    }

    #[test]
    fn test_published_date() {
        assert_eq!(
            published_date("2025-02-01T10:30:00Z"),
            NaiveDate::from_ymd_opt(2025, 2, 1)
        );
        assert_eq!(published_date("not-a-date"), None);
    }

    #[tokio::test]
    async fn test_missing_key_is_hard_error() {
        let extractor = YoutubeExtractor {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
        };
        let err = extractor.extract("creator").await.unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
    }
}
