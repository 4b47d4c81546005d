//! Per-platform admission control.
//!
//! Each platform has a fixed number of extraction slots and a FIFO queue
//! of waiters. A released slot passes through a randomized cool-down
//! window before it is reusable, throttling request cadence independently
//! of raw concurrency; a freed slot is then handed directly to the head
//! waiter, so capacity is never exceeded even transiently.
//!
//! Waiting is bounded: under sustained overload `acquire` fails with
//! `SlotTimeout` instead of queueing forever.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::oneshot;
use tracing::debug;

use crate::config::Settings;
use crate::error::Error;
use crate::model::Platform;
use crate::Result;

struct Lane {
    capacity: usize,
    cooldown: (Duration, Duration),
    active: usize,
    cooling: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

struct Inner {
    lanes: Mutex<HashMap<Platform, Lane>>,
    wait_bound: Duration,
}

/// Shared, cloneable admission controller.
#[derive(Clone)]
pub struct Governor {
    inner: Arc<Inner>,
}

impl Governor {
    pub fn new(settings: &Settings) -> Self {
        let lanes = Platform::ALL
            .iter()
            .map(|&p| {
                let ps = settings.platform(p);
                (
                    p,
                    Lane {
                        capacity: ps.capacity.max(1),
                        cooldown: ps.cooldown(),
                        active: 0,
                        cooling: 0,
                        waiters: VecDeque::new(),
                    },
                )
            })
            .collect();
        Self {
            inner: Arc::new(Inner {
                lanes: Mutex::new(lanes),
                wait_bound: settings.slot_wait(),
            }),
        }
    }

    /// Acquire a slot for `platform`, suspending in FIFO order when the
    /// lane is full. The returned guard releases the slot on drop.
    pub async fn acquire(&self, platform: Platform) -> Result<SlotGuard> {
        let mut rx = {
            let mut lanes = self.inner.lanes.lock().expect("governor lock");
            let lane = lanes.get_mut(&platform).expect("known platform");
            if lane.active + lane.cooling < lane.capacity {
                lane.active += 1;
                debug!(%platform, active = lane.active, "slot acquired");
                return Ok(SlotGuard::new(self.clone(), platform));
            }
            let (tx, rx) = oneshot::channel();
            lane.waiters.push_back(tx);
            rx
        };

        match tokio::time::timeout(self.inner.wait_bound, &mut rx).await {
            // The releaser already counted us active before signalling.
            Ok(Ok(())) => Ok(SlotGuard::new(self.clone(), platform)),
            Ok(Err(_)) => Err(Error::SlotTimeout(platform)),
            Err(_) => {
                self.abandon_waiter(platform, rx);
                Err(Error::SlotTimeout(platform))
            }
        }
    }

    /// Withdraw a timed-out waiter. A release may have handed it a slot
    /// in the window before the receiver is dropped; that permit must
    /// flow back or the lane permanently loses capacity.
    fn abandon_waiter(&self, platform: Platform, mut rx: oneshot::Receiver<()>) {
        rx.close();
        if rx.try_recv().is_ok() {
            debug!(%platform, "reclaiming permit from timed-out waiter");
            self.start_release(platform);
        }
    }

    /// Current active count, for diagnostics and tests.
    pub fn active(&self, platform: Platform) -> usize {
        let lanes = self.inner.lanes.lock().expect("governor lock");
        lanes.get(&platform).map(|l| l.active).unwrap_or(0)
    }

    fn start_release(&self, platform: Platform) {
        let jitter = {
            let mut lanes = self.inner.lanes.lock().expect("governor lock");
            let lane = lanes.get_mut(&platform).expect("known platform");
            lane.active = lane.active.saturating_sub(1);
            lane.cooling += 1;
            sample_jitter(lane.cooldown)
        };

        if jitter.is_zero() {
            self.finish_cooldown(platform);
            return;
        }

        let gov = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(jitter).await;
            gov.finish_cooldown(platform);
        });
    }

    /// Move a cooled slot back into service, handing it to the head
    /// waiter when one is still listening.
    fn finish_cooldown(&self, platform: Platform) {
        let mut lanes = self.inner.lanes.lock().expect("governor lock");
        let lane = lanes.get_mut(&platform).expect("known platform");
        lane.cooling = lane.cooling.saturating_sub(1);

        while lane.active + lane.cooling < lane.capacity {
            match lane.waiters.pop_front() {
                Some(tx) => {
                    lane.active += 1;
                    if tx.send(()).is_err() {
                        // Waiter gave up (timed out); offer the slot on.
                        lane.active -= 1;
                        continue;
                    }
                    debug!(%platform, active = lane.active, "slot handed to waiter");
                    break;
                }
                None => break,
            }
        }
    }
}

fn sample_jitter((min, max): (Duration, Duration)) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
    let ms = if hi > lo {
        rand::rng().random_range(lo..=hi)
    } else {
        lo
    };
    Duration::from_millis(ms)
}

/// RAII slot permit; releases exactly once, on drop or explicitly.
pub struct SlotGuard {
    gov: Governor,
    platform: Platform,
    released: bool,
}

impl SlotGuard {
    fn new(gov: Governor, platform: Platform) -> Self {
        Self {
            gov,
            platform,
            released: false,
        }
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.gov.start_release(self.platform);
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("platform", &self.platform)
            .field("released", &self.released)
            .finish()
    }
}
