//! Cooperative cancellation of a role loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Request to stop a role loop after its current critical section.
///
/// Checked at every loop head. Clones share one flag: cancelling a clone held
/// by a signal listener or a peer thread stops the loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
