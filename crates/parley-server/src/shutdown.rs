//! Graceful shutdown coordination via `CancellationToken`.
//!
//! Two escalation levels: the first [`ShutdownCoordinator::begin`] cancels
//! the *stopping* token, which every long-lived task watches; any later call
//! cancels the *forced* token, which cuts the drain wait short.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Default grace period for sessions to wind down.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// How a drain wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every tracked task finished.
    Drained,
    /// The deadline passed first.
    TimedOut,
    /// A second stop request cut the wait short.
    Forced,
}

/// Coordinates shutdown across the accept loop, router, and sessions.
pub struct ShutdownCoordinator {
    stopping: CancellationToken,
    forced: CancellationToken,
    begun: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            stopping: CancellationToken::new(),
            forced: CancellationToken::new(),
            begun: AtomicBool::new(false),
        }
    }

    /// Get a clone of the stopping token.
    pub fn token(&self) -> CancellationToken {
        self.stopping.clone()
    }

    /// Get a clone of the forced token.
    pub fn forced_token(&self) -> CancellationToken {
        self.forced.clone()
    }

    /// Request shutdown.
    ///
    /// Returns `true` for the first request only. Later requests escalate to
    /// a forced shutdown and return `false`.
    pub fn begin(&self) -> bool {
        if self.begun.swap(true, Ordering::AcqRel) {
            self.forced.cancel();
            false
        } else {
            self.stopping.cancel();
            true
        }
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.stopping.is_cancelled()
    }

    /// Whether the shutdown was escalated.
    pub fn is_forced(&self) -> bool {
        self.forced.is_cancelled()
    }

    /// Close `tracker` and wait for its tasks, up to `timeout`.
    ///
    /// Tasks still running when this returns are left to finish on their own;
    /// nothing is aborted.
    pub async fn drain(&self, tracker: &TaskTracker, timeout: Duration) -> DrainOutcome {
        let _ = tracker.close();
        info!(
            task_count = tracker.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for sessions to finish"
        );

        tokio::select! {
            biased;
            () = tracker.wait() => DrainOutcome::Drained,
            () = self.forced.cancelled() => {
                warn!(remaining = tracker.len(), "shutdown forced, not waiting for sessions");
                DrainOutcome::Forced
            }
            () = tokio::time::sleep(timeout) => {
                warn!(remaining = tracker.len(), "shutdown timed out after {timeout:?}");
                DrainOutcome::TimedOut
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
