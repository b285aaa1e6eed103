//! Linux System V IPC primitives
//!
//! Thin wrappers over `shmget`/`shmat`/`shmdt`/`shmctl` and
//! `semget`/`semop`/`semctl`. Every wrapper converts the C sentinel return
//! into an [`Errno`]; callers map it into [`crate::SyncError`].

use nix::errno::Errno;
use nix::unistd::{Pid, getpid};
use std::ffi::c_void;
use std::ptr::NonNull;

/// Snapshot of `shmid_ds` fields used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSegmentStat {
    /// Segment size in bytes
    pub size: usize,
    /// Current number of attachments
    pub attach_count: u64,
    /// Pid of the creating process
    pub creator_pid: i32,
}

/// Get or create a segment
pub fn shm_get(key: i32, size: usize, flags: i32) -> Result<i32, Errno> {
    // SAFETY: plain syscall with scalar arguments
    Errno::result(unsafe { libc::shmget(key as libc::key_t, size, flags) })
}

/// Map a segment at a kernel-chosen address
pub fn shm_attach(id: i32) -> Result<NonNull<c_void>, Errno> {
    // SAFETY: a null address lets the kernel pick the mapping
    let addr = Errno::result(unsafe { libc::shmat(id, std::ptr::null(), 0) })?;
    NonNull::new(addr).ok_or(Errno::EFAULT)
}

/// Unmap a segment previously returned by [`shm_attach`]
pub fn shm_detach(addr: NonNull<c_void>) -> Result<(), Errno> {
    // SAFETY: shmdt validates the address itself and fails with EINVAL otherwise
    Errno::result(unsafe { libc::shmdt(addr.as_ptr()) }).map(drop)
}

/// Query segment status
pub fn shm_stat(id: i32) -> Result<RawSegmentStat, Errno> {
    // SAFETY: shmid_ds is plain old data; zeroed is a valid initial value
    let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
    // SAFETY: ds is a valid, writable shmid_ds
    Errno::result(unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) })?;

    Ok(RawSegmentStat {
        size: ds.shm_segsz as usize,
        attach_count: ds.shm_nattch as u64,
        creator_pid: ds.shm_cpid,
    })
}

/// Mark a segment for removal once the last attachment is gone
pub fn shm_remove(id: i32) -> Result<(), Errno> {
    // SAFETY: IPC_RMID ignores the buffer argument
    Errno::result(unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) }).map(drop)
}

/// Get or create a semaphore set
pub fn sem_get(key: i32, nsems: i32, flags: i32) -> Result<i32, Errno> {
    // SAFETY: plain syscall with scalar arguments
    Errno::result(unsafe { libc::semget(key as libc::key_t, nsems, flags) })
}

/// Set the value of semaphore 0
pub fn sem_set_value(id: i32, value: i32) -> Result<(), Errno> {
    // SAFETY: SETVAL reads an int-sized semun argument
    Errno::result(unsafe { libc::semctl(id, 0, libc::SETVAL, value as libc::c_int) }).map(drop)
}

/// Read the value of semaphore 0
pub fn sem_get_value(id: i32) -> Result<i32, Errno> {
    // SAFETY: GETVAL takes no semun argument
    Errno::result(unsafe { libc::semctl(id, 0, libc::GETVAL) })
}

/// Add `delta` to semaphore 0, blocking while the result would be negative
pub fn sem_op(id: i32, delta: i16) -> Result<(), Errno> {
    let mut op = libc::sembuf {
        sem_num: 0,
        sem_op: delta,
        sem_flg: 0,
    };
    // SAFETY: op is a valid sembuf and nsops matches
    Errno::result(unsafe { libc::semop(id, &mut op, 1) }).map(drop)
}

/// Remove a semaphore set, waking every waiter with EIDRM
pub fn sem_remove(id: i32) -> Result<(), Errno> {
    // SAFETY: IPC_RMID takes no semun argument
    Errno::result(unsafe { libc::semctl(id, 0, libc::IPC_RMID) }).map(drop)
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: Pid) -> bool {
    use nix::sys::signal::kill;

    match kill(pid, None) {
        Ok(_) => true,
        Err(Errno::ESRCH) => false,
        Err(Errno::EPERM) => true, // Exists, not ours to signal
        Err(_) => false,
    }
}

/// Get current process ID
pub fn get_current_pid() -> Pid {
    getpid()
}
