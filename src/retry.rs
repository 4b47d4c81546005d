//! Scored retry around extraction attempts.
//!
//! Partial success is the normal case when scraping defended pages, so
//! the controller scores each attempt by populated fields, keeps the best
//! snapshot seen, and stops early once a result is full or "good enough".

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::Error;
use crate::model::Snapshot;
use crate::Result;

/// Full score: all five metric fields populated.
pub const FULL_SCORE: u32 = 5;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base backoff, multiplied by the attempt index.
    pub base_backoff: Duration,
    /// Upper bound on the random jitter added to each backoff.
    pub max_jitter: Duration,
    /// Early-exit threshold: primary field (followers) populated plus
    /// this many of the four post-level fields.
    pub good_enough_post_fields: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
            max_jitter: Duration::from_secs(1),
            good_enough_post_fields: 3,
        }
    }
}

impl RetryPolicy {
    fn good_enough(&self, snap: &Snapshot) -> bool {
        snap.score() == FULL_SCORE
            || (snap.followers.is_some()
                && snap.post_field_count() >= self.good_enough_post_fields)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff.saturating_mul(attempt);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

/// Run `op` up to `max_attempts` times and return the best snapshot seen.
///
/// - Ties keep the earliest attempt's snapshot.
/// - Transport-level errors count as score-0 attempts; non-retryable
///   errors (no session, missing credential) propagate immediately.
/// - Exhaustion returns the best result ever observed, all-null only if
///   every attempt came back empty.
pub async fn run_with_retry<F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<Snapshot>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Snapshot>>,
{
    let mut best: Option<Snapshot> = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        match op(attempt).await {
            Ok(snap) => {
                let score = snap.score();
                debug!(attempt, score, "extraction attempt finished");
                let replace = best.as_ref().map(|b| score > b.score()).unwrap_or(true);
                if replace {
                    best = Some(snap);
                }
                if policy.good_enough(best.as_ref().expect("just set")) {
                    break;
                }
            }
            Err(e) if e.is_retryable() => {
                warn!(attempt, error = %e, "extraction attempt failed");
            }
            Err(e) => return Err(e),
        }

        if attempt < policy.max_attempts {
            let delay = policy.backoff(attempt);
            debug!(attempt, ?delay, "backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }

    best.ok_or_else(|| Error::Transport("all extraction attempts failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Platform;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn snap_with_score(score: u32) -> Snapshot {
        let mut snap = Snapshot::empty(Platform::Tiktok, "user");
        let fields: [&mut Option<i64>; 3] = [
            &mut snap.followers,
            &mut snap.last_post_views,
            &mut snap.last_post_likes,
        ];
        let mut remaining = score;
        for field in fields {
            if remaining == 0 {
                break;
            }
            *field = Some(remaining as i64);
            remaining -= 1;
        }
        if remaining > 0 {
            snap.last_post_saves = Some(1);
            remaining -= 1;
        }
        if remaining > 0 {
            snap.last_post_date = chrono::NaiveDate::from_ymd_opt(2025, 1, 1);
        }
        snap
    }

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_jitter: Duration::ZERO,
            good_enough_post_fields: 4,
        }
    }

    #[tokio::test]
    async fn test_keeps_best_scoring_attempt() {
        let scores = [2u32, 4, 1];
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&quick_policy(3), |_| {
            let i = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let snap = snap_with_score(scores[i]);
            async move { Ok(snap) }
        })
        .await
        .unwrap();
        assert_eq!(result.score(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_full_score_stops_early() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&quick_policy(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            let snap = snap_with_score(5);
            async move { Ok(snap) }
        })
        .await
        .unwrap();
        assert_eq!(result.score(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_good_enough_threshold_stops_early() {
        let policy = RetryPolicy {
            good_enough_post_fields: 2,
            ..quick_policy(5)
        };
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            // Followers plus two post fields.
            let mut snap = Snapshot::empty(Platform::Tiktok, "user");
            snap.followers = Some(100);
            snap.last_post_views = Some(5);
            snap.last_post_likes = Some(2);
            async move { Ok(snap) }
        })
        .await
        .unwrap();
        assert_eq!(result.score(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_abort() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&quick_policy(3), |_| {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if i < 2 {
                    Err(Error::Transport("timeout".to_string()))
                } else {
                    Ok(snap_with_score(2))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result.score(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates() {
        let calls = AtomicU32::new(0);
        let err = run_with_retry(&quick_policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<Snapshot, _>(Error::NoSession(Platform::Instagram)) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NoSession(Platform::Instagram)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_transport_error_when_all_failed() {
        let err = run_with_retry(&quick_policy(2), |_| async {
            Err::<Snapshot, _>(Error::Transport("down".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_tie_keeps_earliest() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&quick_policy(2), |_| {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let mut snap = snap_with_score(2);
                snap.username = format!("attempt-{i}");
                Ok(snap)
            }
        })
        .await
        .unwrap();
        assert_eq!(result.username, "attempt-0");
    }
}
