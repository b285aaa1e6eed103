//! Shared buffer layout, canonical pattern and verifier
//!
//! The buffer is 16 signed 64-bit slots overlaid on the shared segment.
//! Every slot is an [`AtomicI64`] accessed with relaxed ordering: single
//! slot accesses are indivisible, a whole pass is not. Ordering between
//! passes comes only from the semaphores of the active policy.

use semsync::consts::{BUFFER_LEN, SEGMENT_SIZE};
use serde::Serialize;
use static_assertions::const_assert_eq;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Buffer overlaid on the shared segment
#[repr(C)]
pub struct SharedBuffer {
    slots: [AtomicI64; BUFFER_LEN],
}

const_assert_eq!(std::mem::size_of::<SharedBuffer>(), SEGMENT_SIZE);
const_assert_eq!(std::mem::align_of::<SharedBuffer>(), 8);

impl SharedBuffer {
    /// Zeroed buffer, for in-process use
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicI64::new(0)),
        }
    }

    /// Write one pass of the pattern.
    ///
    /// Each slot is staged: the expected value, then its double, then after
    /// `slot_delay` the expected value again. An unguarded reader can thus
    /// observe a half-written pass.
    pub fn fill(&self, pattern: &Pattern, slot_delay: Duration) {
        for (index, slot) in self.slots.iter().enumerate() {
            let value = pattern.expected(index);
            slot.store(value, Ordering::Relaxed);
            slot.store(value * 2, Ordering::Relaxed);
            tracing::trace!(index, value, "write");
            if !slot_delay.is_zero() {
                std::thread::sleep(slot_delay);
            }
            slot.store(value, Ordering::Relaxed);
        }
    }

    /// Copy every slot into a private snapshot
    pub fn snapshot(&self) -> Snapshot {
        let values = std::array::from_fn(|index| {
            let value = self.slots[index].load(Ordering::Relaxed);
            tracing::trace!(index, value, "read");
            value
        });
        Snapshot(values)
    }

    /// Read one slot
    pub fn get(&self, index: usize) -> Option<i64> {
        self.slots.get(index).map(|slot| slot.load(Ordering::Relaxed))
    }

    /// Overwrite one slot
    pub fn set(&self, index: usize, value: i64) -> bool {
        match self.slots.get(index) {
            Some(slot) => {
                slot.store(value, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer-private copy of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot(pub [i64; BUFFER_LEN]);

impl Snapshot {
    /// Slot values
    pub fn values(&self) -> &[i64; BUFFER_LEN] {
        &self.0
    }
}

/// Canonical fill pattern: slot `i` holds `i + offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    offset: i64,
}

impl Pattern {
    /// Pattern with the given offset
    pub const fn new(offset: i64) -> Self {
        Self { offset }
    }

    /// Offset of slot 0
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// Expected value of a slot
    pub const fn expected(&self, index: usize) -> i64 {
        index as i64 + self.offset
    }

    /// The full expected snapshot
    pub fn expected_snapshot(&self) -> Snapshot {
        Snapshot(std::array::from_fn(|index| self.expected(index)))
    }

    /// Find the first slot that deviates from the pattern
    pub fn verify(&self, snapshot: &Snapshot) -> Result<(), Mismatch> {
        match snapshot
            .0
            .iter()
            .enumerate()
            .find(|&(index, &observed)| observed != self.expected(index))
        {
            Some((index, &observed)) => Err(Mismatch {
                index,
                expected: self.expected(index),
                observed,
            }),
            None => Ok(()),
        }
    }
}

/// First deviation found by [`Pattern::verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Slot index
    pub index: usize,
    /// Value the pattern requires
    pub expected: i64,
    /// Value actually read
    pub observed: i64,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sequence error at slot {} (expected value: {}, read value: {})",
            self.index, self.expected, self.observed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use semsync::consts::LOCKED_OFFSET;

    #[test]
    fn fill_then_snapshot_matches_pattern() {
        let buffer = SharedBuffer::new();
        let pattern = Pattern::new(LOCKED_OFFSET);

        buffer.fill(&pattern, Duration::ZERO);
        let snapshot = buffer.snapshot();

        assert_eq!(snapshot, pattern.expected_snapshot());
        assert_eq!(snapshot.values()[0], 65000);
        assert_eq!(snapshot.values()[15], 65015);
        assert!(pattern.verify(&snapshot).is_ok());
    }

    #[test]
    fn zeroed_buffer_fails_at_first_slot() {
        let buffer = SharedBuffer::new();
        let pattern = Pattern::new(6500);

        let mismatch = pattern.verify(&buffer.snapshot()).unwrap_err();
        assert_eq!(
            mismatch,
            Mismatch {
                index: 0,
                expected: 6500,
                observed: 0
            }
        );
    }

    #[test]
    fn slot_accessors_are_bounds_checked() {
        let buffer = SharedBuffer::new();
        assert!(buffer.set(3, 42));
        assert_eq!(buffer.get(3), Some(42));
        assert!(!buffer.set(BUFFER_LEN, 1));
        assert_eq!(buffer.get(BUFFER_LEN), None);
    }

    #[test]
    fn mismatch_display() {
        let mismatch = Mismatch {
            index: 4,
            expected: 6504,
            observed: 13008,
        };
        assert_eq!(
            mismatch.to_string(),
            "sequence error at slot 4 (expected value: 6504, read value: 13008)"
        );
    }

    proptest! {
        #[test]
        fn verify_reports_first_corrupted_slot(
            offset in 0i64..1_000_000,
            index in 0usize..BUFFER_LEN,
            later in 0usize..BUFFER_LEN,
            delta in 1i64..1_000,
        ) {
            let pattern = Pattern::new(offset);
            let mut snapshot = pattern.expected_snapshot();
            snapshot.0[index] += delta;
            if later > index {
                snapshot.0[later] -= delta;
            }

            let mismatch = pattern.verify(&snapshot).unwrap_err();
            prop_assert_eq!(mismatch.index, index);
            prop_assert_eq!(mismatch.expected, offset + index as i64);
            prop_assert_eq!(mismatch.observed, offset + index as i64 + delta);
        }

        #[test]
        fn verify_accepts_any_offset(offset in 0i64..semsync::consts::MAX_OFFSET) {
            let pattern = Pattern::new(offset);
            prop_assert!(pattern.verify(&pattern.expected_snapshot()).is_ok());
        }
    }
}
