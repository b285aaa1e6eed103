//! Error types for segment, semaphore and protocol operations

use nix::errno::Errno;
use thiserror::Error;

/// Errors that can occur while coordinating through the shared segment
#[derive(Error, Debug)]
pub enum SyncError {
    /// The facility rejected segment creation or lookup
    #[error("Shared memory segment {key} unavailable: {source}")]
    SegmentCreate {
        /// System V key
        key: i32,
        /// Underlying errno
        source: Errno,
    },

    /// Mapping the segment into the address space failed
    #[error("Attach of segment {id} failed: {source}")]
    Attach {
        /// Segment identifier
        id: i32,
        /// Underlying errno
        source: Errno,
    },

    /// The segment is too small to hold the shared buffer
    #[error("Segment {id} holds {size} bytes, {required} required")]
    SegmentTooSmall {
        /// Segment identifier
        id: i32,
        /// Actual size in bytes
        size: usize,
        /// Required size in bytes
        required: usize,
    },

    /// Unmapping the segment failed
    #[error("Detach of segment {id} failed: {source}")]
    Detach {
        /// Segment identifier
        id: i32,
        /// Underlying errno
        source: Errno,
    },

    /// Removing the segment or a semaphore failed
    #[error("Removal of IPC object {id} failed: {source}")]
    Destroy {
        /// Segment or semaphore identifier
        id: i32,
        /// Underlying errno
        source: Errno,
    },

    /// Querying segment status failed
    #[error("Status of segment {id} unavailable: {source}")]
    Stat {
        /// Segment identifier
        id: i32,
        /// Underlying errno
        source: Errno,
    },

    /// The facility rejected semaphore creation or lookup
    #[error("Semaphore {key} unavailable: {source}")]
    SemaphoreCreate {
        /// System V key
        key: i32,
        /// Underlying errno
        source: Errno,
    },

    /// A semaphore operation failed for a reason other than interruption
    #[error("Semaphore {id} {op} failed: {source}")]
    SemaphoreOp {
        /// Semaphore identifier
        id: i32,
        /// Operation name
        op: &'static str,
        /// Underlying errno
        source: Errno,
    },

    /// The semaphore was removed while in use
    #[error("Semaphore {id} removed during {op}")]
    SemaphoreRemoved {
        /// Semaphore identifier
        id: i32,
        /// Operation name
        op: &'static str,
    },

    /// A blocking wait was interrupted by a signal
    #[error("Wait on semaphore {id} interrupted")]
    Interrupted {
        /// Semaphore identifier
        id: i32,
    },

    /// Signal delivery or disposition change failed
    #[error("Signal error: {source}")]
    Signal {
        /// Underlying errno
        #[from]
        source: Errno,
    },

    /// Installing the interrupt handler failed
    #[error("Interrupt handler error: {source}")]
    Interrupt {
        /// Source ctrlc error
        #[from]
        source: ctrlc::Error,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Configuration error
    #[error("Configuration error: {source}")]
    Config {
        /// Source configuration error
        #[from]
        source: semsync::config::ConfigError,
    },
}

impl SyncError {
    /// Whether the error must terminate the participant immediately.
    ///
    /// Cleanup failures (detach, destroy, stat) are reported and execution
    /// continues; an interrupted wait ends the role loop without being fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::Detach { .. }
                | SyncError::Destroy { .. }
                | SyncError::Stat { .. }
                | SyncError::Interrupted { .. }
        )
    }

    /// Whether the error is an interrupted semaphore wait.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SyncError::Interrupted { .. })
    }
}

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_failures_are_recoverable() {
        assert!(!SyncError::Detach { id: 1, source: Errno::EINVAL }.is_fatal());
        assert!(!SyncError::Destroy { id: 1, source: Errno::EPERM }.is_fatal());
        assert!(!SyncError::Stat { id: 1, source: Errno::EACCES }.is_fatal());
    }

    #[test]
    fn creation_and_wait_failures_are_fatal() {
        assert!(SyncError::SegmentCreate { key: 111, source: Errno::EINVAL }.is_fatal());
        assert!(SyncError::SemaphoreCreate { key: 112, source: Errno::ENOSPC }.is_fatal());
        assert!(
            SyncError::SemaphoreOp {
                id: 3,
                op: "acquire",
                source: Errno::EINVAL
            }
            .is_fatal()
        );
        assert!(SyncError::SemaphoreRemoved { id: 3, op: "acquire" }.is_fatal());
    }

    #[test]
    fn interruption_is_benign() {
        let err = SyncError::Interrupted { id: 4 };
        assert!(!err.is_fatal());
        assert!(err.is_interrupted());
    }

    #[test]
    fn display_names_the_object() {
        let err = SyncError::SegmentTooSmall {
            id: 9,
            size: 64,
            required: 128,
        };
        assert_eq!(err.to_string(), "Segment 9 holds 64 bytes, 128 required");
    }
}
