//! Kernel-managed binary semaphore
//!
//! A System V semaphore set with a single counter. `acquire` is the only
//! blocking point of the whole system and has no timeout: if the peer dies
//! while holding the counter, the waiter blocks until the semaphore is
//! removed or a signal interrupts it.

use crate::error::{SyncError, SyncResult};
use crate::platform;
use nix::errno::Errno;
use semsync::consts::IPC_PERMISSIONS;

/// Named counting semaphore shared between participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Semaphore {
    key: i32,
    id: i32,
}

impl Semaphore {
    /// Allocate the counter, or return the existing one for `key`.
    ///
    /// A freshly created counter starts at 0; call [`set_value`] to make it
    /// available.
    ///
    /// [`set_value`]: Semaphore::set_value
    pub fn create(key: i32) -> SyncResult<Self> {
        let id = platform::sem_get(key, 1, IPC_PERMISSIONS | libc::IPC_CREAT)
            .map_err(|source| SyncError::SemaphoreCreate { key, source })?;
        tracing::info!(key, id, "Semaphore has been created");
        Ok(Self { key, id })
    }

    /// Resolve an existing counter by key
    pub fn open(key: i32) -> SyncResult<Self> {
        let id = platform::sem_get(key, 1, 0)
            .map_err(|source| SyncError::SemaphoreCreate { key, source })?;
        tracing::debug!(key, id, "Semaphore opened");
        Ok(Self { key, id })
    }

    /// System V key
    pub fn key(&self) -> i32 {
        self.key
    }

    /// Kernel identifier
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Initialize the counter
    pub fn set_value(&self, value: i32) -> SyncResult<()> {
        platform::sem_set_value(self.id, value).map_err(|e| self.op_error("set_value", e))?;
        tracing::debug!(id = self.id, value, "Semaphore value set");
        Ok(())
    }

    /// Current counter value, for diagnostics
    pub fn value(&self) -> SyncResult<i32> {
        platform::sem_get_value(self.id).map_err(|e| self.op_error("value", e))
    }

    /// Block until the counter is positive, then decrement it.
    ///
    /// A signal arriving during the wait yields [`SyncError::Interrupted`];
    /// the wait is not retried.
    pub fn acquire(&self) -> SyncResult<()> {
        platform::sem_op(self.id, -1).map_err(|e| self.op_error("acquire", e))
    }

    /// Increment the counter, waking at most one waiter
    pub fn release(&self) -> SyncResult<()> {
        platform::sem_op(self.id, 1).map_err(|e| self.op_error("release", e))
    }

    /// Remove the counter.
    ///
    /// Blocked waiters in any process fail with [`SyncError::SemaphoreRemoved`].
    pub fn destroy(self) -> SyncResult<()> {
        platform::sem_remove(self.id).map_err(|source| SyncError::Destroy {
            id: self.id,
            source,
        })?;
        tracing::info!(key = self.key, id = self.id, "Semaphore removed");
        Ok(())
    }

    fn op_error(&self, op: &'static str, errno: Errno) -> SyncError {
        match errno {
            Errno::EINTR => SyncError::Interrupted { id: self.id },
            Errno::EIDRM | Errno::EINVAL => SyncError::SemaphoreRemoved { id: self.id, op },
            source => SyncError::SemaphoreOp {
                id: self.id,
                op,
                source,
            },
        }
    }
}
