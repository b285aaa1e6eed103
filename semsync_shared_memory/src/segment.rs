//! System V shared segment handle and attached view

use crate::buffer::SharedBuffer;
use crate::error::{SyncError, SyncResult};
use crate::platform::{self, RawSegmentStat};
use semsync::consts::IPC_PERMISSIONS;
use serde::Serialize;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

/// Handle to a kernel-managed shared segment
///
/// The handle is plain identity (key + id); it maps nothing by itself and
/// can be shared freely between threads. Mapping happens in [`attach`].
///
/// [`attach`]: SharedSegment::attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedSegment {
    key: i32,
    id: i32,
}

/// Informational status of a segment
///
/// `attach_count` is advisory: it can change between the read and any use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentStat {
    /// Size in bytes
    pub size: usize,
    /// Current number of attachments
    pub attach_count: u64,
    /// Pid of the creating process
    pub creator_pid: i32,
}

impl From<RawSegmentStat> for SegmentStat {
    fn from(raw: RawSegmentStat) -> Self {
        Self {
            size: raw.size,
            attach_count: raw.attach_count,
            creator_pid: raw.creator_pid,
        }
    }
}

impl SharedSegment {
    /// Create the segment, or return the existing one if `key` is taken by a
    /// segment of at least `size` bytes.
    pub fn create(key: i32, size: usize) -> SyncResult<Self> {
        let id = platform::shm_get(key, size, IPC_PERMISSIONS | libc::IPC_CREAT)
            .map_err(|source| SyncError::SegmentCreate { key, source })?;

        let segment = Self { key, id };
        match segment.stat() {
            Ok(stat) => tracing::info!(key, id, size = stat.size, "Shared memory segment ready"),
            Err(e) => tracing::warn!(key, id, error = %e, "Shared memory segment ready, status unavailable"),
        }
        Ok(segment)
    }

    /// Resolve an existing segment by key
    pub fn open(key: i32) -> SyncResult<Self> {
        let id = platform::shm_get(key, 0, 0)
            .map_err(|source| SyncError::SegmentCreate { key, source })?;
        tracing::debug!(key, id, "Shared memory segment opened");
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

    /// Map the segment and view it as the shared buffer.
    ///
    /// Segments smaller than the buffer are rejected before mapping.
    pub fn attach(&self) -> SyncResult<SegmentView> {
        let required = std::mem::size_of::<SharedBuffer>();
        let size = platform::shm_stat(self.id)
            .map_err(|source| SyncError::Attach { id: self.id, source })?
            .size;
        if size < required {
            return Err(SyncError::SegmentTooSmall {
                id: self.id,
                size,
                required,
            });
        }

        let addr = platform::shm_attach(self.id)
            .map_err(|source| SyncError::Attach { id: self.id, source })?;

        if let Ok(stat) = self.stat() {
            tracing::info!(
                id = self.id,
                attach_count = stat.attach_count,
                "Context attached"
            );
        }

        Ok(SegmentView { id: self.id, addr })
    }

    /// Status snapshot, for diagnostics only
    pub fn stat(&self) -> SyncResult<SegmentStat> {
        platform::shm_stat(self.id)
            .map(SegmentStat::from)
            .map_err(|source| SyncError::Stat { id: self.id, source })
    }

    /// Mark the segment for removal.
    ///
    /// Existing mappings stay valid until detached; the key is released
    /// immediately, so a later [`create`](Self::create) gets a fresh segment.
    pub fn destroy(self) -> SyncResult<()> {
        platform::shm_remove(self.id).map_err(|source| SyncError::Destroy {
            id: self.id,
            source,
        })?;
        tracing::info!(key = self.key, id = self.id, "Memory segment removed");
        Ok(())
    }
}

/// Attached mapping of a segment
///
/// Dereferences to the [`SharedBuffer`]. Dropping a view without calling
/// [`detach`](Self::detach) detaches it; failures there are logged.
#[derive(Debug)]
pub struct SegmentView {
    id: i32,
    addr: NonNull<c_void>,
}

// SAFETY: the view only hands out &SharedBuffer, whose slots are atomics.
unsafe impl Send for SegmentView {}
// SAFETY: as above; no interior state besides the mapping itself.
unsafe impl Sync for SegmentView {}

impl SegmentView {
    /// Segment identifier this view maps
    pub fn segment_id(&self) -> i32 {
        self.id
    }

    /// Unmap the segment
    pub fn detach(self) -> SyncResult<()> {
        let view = ManuallyDrop::new(self);
        view.unmap()
    }

    fn unmap(&self) -> SyncResult<()> {
        platform::shm_detach(self.addr).map_err(|source| SyncError::Detach {
            id: self.id,
            source,
        })?;

        match platform::shm_stat(self.id) {
            Ok(stat) => tracing::info!(
                id = self.id,
                creator_pid = stat.creator_pid,
                remaining = stat.attach_count,
                "Memory detached"
            ),
            // Already removed and this was the last attachment.
            Err(_) => tracing::info!(id = self.id, "Memory detached"),
        }
        Ok(())
    }
}

impl Deref for SegmentView {
    type Target = SharedBuffer;

    fn deref(&self) -> &SharedBuffer {
        // SAFETY: the mapping is at least size_of::<SharedBuffer>() bytes
        // (checked in attach), page aligned, and lives until unmapped, which
        // only happens when the view is consumed or dropped.
        unsafe { self.addr.cast::<SharedBuffer>().as_ref() }
    }
}

impl Drop for SegmentView {
    fn drop(&mut self) {
        if let Err(e) = self.unmap() {
            tracing::error!(error = %e, "Memory detaching error");
        }
    }
}
