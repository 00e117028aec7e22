//! Synthetic progress ticker.
//!
//! The service reports no real progress, so the bar creeps toward 95% on a
//! fixed cadence until the cycle ends.

use super::state::Snapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Progress never passes this until a result is committed.
pub const PROGRESS_CAP: f32 = 95.0;

/// Shortest tick the ticker runs at; shorter settings are raised to this.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Returns the progress after one more tick.
pub(crate) fn advance(progress: f32, steps: u32) -> f32 {
    let step = 100.0 / steps.max(1) as f32;
    (progress + step).min(PROGRESS_CAP).max(progress)
}

/// Handle to a running ticker. Stop it with [`ProgressTicker::stop`]; dropping
/// it aborts the task without waiting.
pub(crate) struct ProgressTicker {
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Starts ticking `cycle`'s progress every `tick`.
    ///
    /// Writes are skipped once the snapshot belongs to another cycle.
    pub(crate) fn start(
        state: Arc<watch::Sender<Snapshot>>,
        cycle: u64,
        steps: u32,
        tick: Duration,
    ) -> Self {
        let tick = tick.max(MIN_TICK);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
            loop {
                interval.tick().await;
                state.send_if_modified(|s| {
                    if s.cycle != cycle || !s.phase.is_in_flight() {
                        return false;
                    }
                    let next = advance(s.progress, steps);
                    if next == s.progress {
                        return false;
                    }
                    s.progress = next;
                    true
                });
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Aborts the ticker and waits until it has stopped.
    pub(crate) async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
