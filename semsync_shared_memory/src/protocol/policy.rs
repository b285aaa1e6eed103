//! Policy gates around the write and read passes

use crate::error::{SyncError, SyncResult};
use crate::semaphore::Semaphore;
use semsync::policy::{IpcKeys, PolicyKind};

/// Provisioned synchronization policy.
///
/// | Policy            | enter write  | exit write   | enter read   | exit read    |
/// |-------------------|--------------|--------------|--------------|--------------|
/// | `NoLock`          | -            | -            | -            | -            |
/// | `MutualExclusion` | P(mutex)     | V(mutex)     | P(mutex)     | V(mutex)     |
/// | `Handshake`       | P(write)     | V(read)      | P(read)      | V(write)     |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Unguarded access
    NoLock,
    /// One binary semaphore, initially 1
    MutualExclusion {
        /// Shared mutex
        mutex: Semaphore,
    },
    /// Two binary semaphores, write turn initially 1, read turn initially 0
    Handshake {
        /// Producer may write
        write_turn: Semaphore,
        /// Consumer may read
        read_turn: Semaphore,
    },
}

impl SyncPolicy {
    /// Create and initialize the semaphores `kind` needs.
    ///
    /// Values are set explicitly, so counters left over from an earlier run
    /// under the same keys start from the initial state again.
    pub fn provision(kind: PolicyKind, keys: &IpcKeys) -> SyncResult<Self> {
        let policy = match kind {
            PolicyKind::NoLock => SyncPolicy::NoLock,
            PolicyKind::MutualExclusion => {
                let mutex = Semaphore::create(keys.mutex)?;
                mutex.set_value(1)?;
                SyncPolicy::MutualExclusion { mutex }
            }
            PolicyKind::Handshake => {
                let write_turn = Semaphore::create(keys.write_turn)?;
                write_turn.set_value(1)?;
                let read_turn = Semaphore::create(keys.read_turn)?;
                read_turn.set_value(0)?;
                SyncPolicy::Handshake {
                    write_turn,
                    read_turn,
                }
            }
        };
        policy.log_values();
        Ok(policy)
    }

    /// Resolve semaphores another participant provisioned
    pub fn open(kind: PolicyKind, keys: &IpcKeys) -> SyncResult<Self> {
        Ok(match kind {
            PolicyKind::NoLock => SyncPolicy::NoLock,
            PolicyKind::MutualExclusion => SyncPolicy::MutualExclusion {
                mutex: Semaphore::open(keys.mutex)?,
            },
            PolicyKind::Handshake => SyncPolicy::Handshake {
                write_turn: Semaphore::open(keys.write_turn)?,
                read_turn: Semaphore::open(keys.read_turn)?,
            },
        })
    }

    /// Policy kind
    pub fn kind(&self) -> PolicyKind {
        match self {
            SyncPolicy::NoLock => PolicyKind::NoLock,
            SyncPolicy::MutualExclusion { .. } => PolicyKind::MutualExclusion,
            SyncPolicy::Handshake { .. } => PolicyKind::Handshake,
        }
    }

    /// Semaphores held by this policy
    pub fn semaphores(&self) -> Vec<Semaphore> {
        match *self {
            SyncPolicy::NoLock => Vec::new(),
            SyncPolicy::MutualExclusion { mutex } => vec![mutex],
            SyncPolicy::Handshake {
                write_turn,
                read_turn,
            } => vec![write_turn, read_turn],
        }
    }

    /// Gate before a write pass
    pub fn enter_write(&self) -> SyncResult<()> {
        match self {
            SyncPolicy::NoLock => Ok(()),
            SyncPolicy::MutualExclusion { mutex } => mutex.acquire(),
            SyncPolicy::Handshake { write_turn, .. } => write_turn.acquire(),
        }
    }

    /// Gate after a write pass
    pub fn exit_write(&self) -> SyncResult<()> {
        match self {
            SyncPolicy::NoLock => Ok(()),
            SyncPolicy::MutualExclusion { mutex } => mutex.release(),
            SyncPolicy::Handshake { read_turn, .. } => read_turn.release(),
        }
    }

    /// Gate before a read pass
    pub fn enter_read(&self) -> SyncResult<()> {
        match self {
            SyncPolicy::NoLock => Ok(()),
            SyncPolicy::MutualExclusion { mutex } => mutex.acquire(),
            SyncPolicy::Handshake { read_turn, .. } => read_turn.acquire(),
        }
    }

    /// Gate after a read pass
    pub fn exit_read(&self) -> SyncResult<()> {
        match self {
            SyncPolicy::NoLock => Ok(()),
            SyncPolicy::MutualExclusion { mutex } => mutex.release(),
            SyncPolicy::Handshake { write_turn, .. } => write_turn.release(),
        }
    }

    /// Remove every semaphore.
    ///
    /// All removals are attempted; the first failure is returned.
    pub fn teardown(self) -> SyncResult<()> {
        let mut first: Option<SyncError> = None;
        for sem in self.semaphores() {
            if let Err(e) = sem.destroy() {
                tracing::warn!(key = sem.key(), error = %e, "Semaphore removal failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn log_values(&self) {
        for sem in self.semaphores() {
            match sem.value() {
                Ok(value) => {
                    tracing::info!(key = sem.key(), id = sem.id(), value, "Semaphore value")
                }
                Err(e) => {
                    tracing::warn!(key = sem.key(), error = %e, "Semaphore value unavailable")
                }
            }
        }
    }
}
