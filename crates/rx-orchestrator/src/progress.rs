//! Cosmetic progress for tree fetches, which report no real progress.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::state::SharedState;

/// Progress never passes this while a fetch is still running.
pub const LOADING_CEILING: f64 = 95.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEstimator {
    value: f64,
    increment: f64,
    tick: Duration,
}

impl ProgressEstimator {
    /// Estimator that would reach 100 after `estimated_secs` at one tick per
    /// `tick_ms`.
    pub fn new(estimated_secs: u64, tick_ms: u64) -> Self {
        let tick_ms = tick_ms.max(1);
        let ticks = estimated_secs.saturating_mul(1000) / tick_ms;
        let increment = if ticks > 0 { 100.0 / ticks as f64 } else { 100.0 };
        Self {
            value: 0.0,
            increment,
            tick: Duration::from_millis(tick_ms),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }

    pub fn tick(&mut self) -> f64 {
        self.value = (self.value + self.increment).min(LOADING_CEILING);
        self.value
    }

    /// Tick into `state.progress` while fetch `generation` is in flight.
    /// The task ends on its own once the fetch settles; callers abort it
    /// earlier when they can. Settling writes the final 100 or 0 itself.
    pub fn spawn(mut self, state: SharedState, generation: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let value = self.tick();
                let running = state.update(|s| {
                    let current = s.fetch_generation == generation && s.fetch_status.is_in_flight();
                    if current {
                        s.progress = value;
                    }
                    current
                });
                if !running {
                    break;
                }
            }
        })
    }
}
