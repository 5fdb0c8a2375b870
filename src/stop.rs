use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked once per solver iteration.
///
/// Cloning yields a handle to the same flag, so another thread can request
/// a stop while a solve is running. Setting the flag causes a graceful exit
/// with [`SolverStatus::Interrupted`](crate::SolverStatus::Interrupted)
/// after the current iteration's stop check.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    stop: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        StopSignal::default()
    }

    /// Request a stop. Safe to call from any thread; idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// True if a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
