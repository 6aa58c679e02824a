//! Adaptive request pacing.
//!
//! A single `Pacer` is shared by every call a client makes. It tracks the
//! currently mandated delay (raised by 429 responses, decayed by healthy ones)
//! and the instant of the last physical dispatch.
//!
//! The state sits behind an async mutex that is held across the wait in
//! [`Pacer::wait_turn`], so two concurrent callers can never both observe a
//! stale "safe to proceed" state and burst past the limiter.
//!
//! Every 429 bumps an epoch counter. [`Pacer::relax`] only decays when the
//! epoch is unchanged since the caller's dispatch, so a slow healthy response
//! cannot undo an increase caused by a 429 that arrived meanwhile.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
struct PaceState {
    mandated_delay: Duration,
    last_request: Option<Instant>,
    epoch: u64,
}

/// Ticket returned by [`Pacer::wait_turn`], identifying the 429 epoch at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchEpoch(u64);

/// Shared rate-limit state.
#[derive(Debug)]
pub struct Pacer {
    state: Mutex<PaceState>,
    min_spacing: Duration,
    decay_step: Duration,
}

impl Pacer {
    /// Create a pacer with the given spacing floor and decay step
    pub fn new(min_spacing: Duration, decay_step: Duration) -> Self {
        Self {
            state: Mutex::new(PaceState {
                mandated_delay: Duration::ZERO,
                last_request: None,
                epoch: 0,
            }),
            min_spacing,
            decay_step,
        }
    }

    /// Wait until the next dispatch is allowed, then claim the slot.
    ///
    /// The gap enforced since the previous dispatch is
    /// `max(mandated_delay, min_spacing)`.
    pub async fn wait_turn(&self) -> DispatchEpoch {
        let mut state = self.state.lock().await;
        let gap = state.mandated_delay.max(self.min_spacing);
        if let Some(last) = state.last_request {
            let ready = last + gap;
            if ready > Instant::now() {
                sleep_until(ready).await;
            }
        }
        state.last_request = Some(Instant::now());
        DispatchEpoch(state.epoch)
    }

    /// Record a 429: the mandated delay becomes `delay`.
    pub async fn throttle(&self, delay: Duration) {
        let mut state = self.state.lock().await;
        state.mandated_delay = delay;
        state.epoch += 1;
    }

    /// Record a non-429 response dispatched at `epoch`.
    ///
    /// Decays the mandated delay by one step, saturating at zero, unless a 429
    /// was recorded after the dispatch.
    pub async fn relax(&self, epoch: DispatchEpoch) {
        let mut state = self.state.lock().await;
        if state.epoch != epoch.0 {
            return;
        }
        state.mandated_delay = state.mandated_delay.saturating_sub(self.decay_step);
    }

    /// Currently mandated delay
    pub async fn mandated_delay(&self) -> Duration {
        self.state.lock().await.mandated_delay
    }
}
