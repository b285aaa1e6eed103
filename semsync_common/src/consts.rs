//! System-wide constants for the semsync workspace.
//!
//! Single source of truth for buffer geometry, IPC keys, pattern offsets,
//! cadences and cycle counts. Imported by all crates; never duplicated elsewhere.

/// Number of slots in the shared buffer.
pub const BUFFER_LEN: usize = 16;

/// Size of one buffer slot in bytes (signed 64-bit integer).
pub const SLOT_SIZE: usize = 8;

/// Size of the shared segment in bytes (16 × 8).
pub const SEGMENT_SIZE: usize = BUFFER_LEN * SLOT_SIZE;

/// Permission bits used when creating System V IPC objects.
pub const IPC_PERMISSIONS: i32 = 0o666;

/// Default System V key of the shared segment.
pub const SHARED_MEM_KEY: i32 = 111;

/// Default key of the single mutual-exclusion semaphore.
pub const MUTEX_SEM_KEY: i32 = 112;

/// Default key of the handshake "turn to write" semaphore.
pub const WRITE_TURN_SEM_KEY: i32 = 112;

/// Default key of the handshake "turn to read" semaphore.
pub const READ_TURN_SEM_KEY: i32 = 113;

/// Pattern offset of the unsynchronized variant.
pub const NO_LOCK_OFFSET: i64 = 6500;

/// Pattern offset of the semaphore-guarded variants.
pub const LOCKED_OFFSET: i64 = 65000;

/// Largest offset for which the staged `2 * (offset + i)` write cannot overflow.
pub const MAX_OFFSET: i64 = i64::MAX / 2 - BUFFER_LEN as i64;

/// Producer idle time between passes without synchronization [ms].
pub const NO_LOCK_WRITE_IDLE_MS: u64 = 5;

/// Consumer idle time between passes without synchronization [ms].
pub const NO_LOCK_READ_IDLE_MS: u64 = 2;

/// Per-slot dwell of the unsynchronized producer [µs].
pub const NO_LOCK_SLOT_DELAY_US: u64 = 100;

/// Idle time of both roles under mutual exclusion [ms].
pub const MUTEX_IDLE_MS: u64 = 40;

/// Cycle count under mutual exclusion.
pub const MUTEX_CYCLES: u32 = 100;

/// Producer idle time under the handshake [ms].
pub const HANDSHAKE_WRITE_IDLE_MS: u64 = 20;

/// Consumer idle time under the handshake [ms].
pub const HANDSHAKE_READ_IDLE_MS: u64 = 100;

/// Cycle count under the handshake.
pub const HANDSHAKE_CYCLES: u32 = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_holds_exactly_one_buffer() {
        assert_eq!(SEGMENT_SIZE, 128);
        assert_eq!(SLOT_SIZE, std::mem::size_of::<i64>());
    }

    #[test]
    fn handshake_keys_are_distinct() {
        assert_ne!(WRITE_TURN_SEM_KEY, READ_TURN_SEM_KEY);
        assert_ne!(SHARED_MEM_KEY, MUTEX_SEM_KEY);
    }

    #[test]
    fn offsets_fit_staged_write() {
        assert!(NO_LOCK_OFFSET <= MAX_OFFSET);
        assert!(LOCKED_OFFSET <= MAX_OFFSET);
        assert!((MAX_OFFSET + BUFFER_LEN as i64).checked_mul(2).is_some());
    }

    #[test]
    fn no_lock_reader_outpaces_writer() {
        assert!(NO_LOCK_READ_IDLE_MS < NO_LOCK_WRITE_IDLE_MS);
    }
}
