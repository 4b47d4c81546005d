//! Delayed shadowban recheck.
//!
//! A first pass reporting exactly zero views on the latest post is the
//! shadowban signal; the consumer schedules one delayed re-extraction and
//! tags the account from the recheck outcome. Scheduling is an explicit
//! task with an owned handle so teardown can cancel it; the verdict is a
//! pure function of the two snapshots, separable from the scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::model::{Platform, Snapshot};

/// Recheck outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Views appeared on recheck; the zero was transient.
    Clear,
    /// Still exactly zero views: possibly suppressed.
    Suspected,
    /// The recheck could not determine a view count. Not evidence either
    /// way; zero and "unknown" must not be conflated.
    Inconclusive,
}

/// Whether a first-pass snapshot warrants a delayed recheck.
pub fn needs_recheck(first: &Snapshot) -> bool {
    first.last_post_views == Some(0)
}

/// Pure verdict from the first pass and the recheck.
pub fn assess(first: &Snapshot, recheck: &Snapshot) -> Verdict {
    debug_assert!(needs_recheck(first));
    let _ = first;
    match recheck.last_post_views {
        Some(0) => Verdict::Suspected,
        Some(_) => Verdict::Clear,
        None => Verdict::Inconclusive,
    }
}

/// Owns the scheduled recheck tasks.
pub struct ShadowbanMonitor {
    engine: Arc<Engine>,
    delay: Duration,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ShadowbanMonitor {
    pub fn new(engine: Arc<Engine>, delay: Duration) -> Self {
        Self {
            engine,
            delay,
            handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Schedule a single delayed re-extraction when `first` carries the
    /// shadowban signal. `on_verdict` applies the tag.
    pub fn schedule<F>(&self, platform: Platform, first: Snapshot, on_verdict: F)
    where
        F: FnOnce(Verdict) + Send + 'static,
    {
        if !needs_recheck(&first) {
            return;
        }
        info!(%platform, username = %first.username, delay = ?self.delay, "scheduling shadowban recheck");

        let engine = self.engine.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match engine.scrape(platform, &first.username).await {
                Ok(recheck) => {
                    let verdict = assess(&first, &recheck);
                    debug!(username = %first.username, ?verdict, "shadowban recheck finished");
                    on_verdict(verdict);
                }
                Err(_) => on_verdict(Verdict::Inconclusive),
            }
        });
        let mut handles = self.handles.lock().expect("monitor lock");
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Cancel all pending rechecks. Called on component teardown.
    pub fn shutdown(&self) {
        let mut handles = self.handles.lock().expect("monitor lock");
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ShadowbanMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
