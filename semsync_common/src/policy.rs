//! Synchronization policy selection and per-policy parameters.
//!
//! Three policies share one producer/consumer skeleton and differ only in
//! guarding, pattern offset, cadence and termination:
//!
//! | Policy            | Semaphores                 | Offset | Cycles    | Write / read idle |
//! |-------------------|----------------------------|--------|-----------|-------------------|
//! | `NoLock`          | none                       | 6500   | unbounded | 5 ms / 2 ms       |
//! | `MutualExclusion` | mutex (1)                  | 65000  | 100       | 40 ms / 40 ms     |
//! | `Handshake`       | write turn (1), read turn (0) | 65000 | 50     | 20 ms / 100 ms    |

use crate::config::ConfigError;
use crate::consts::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Synchronization strategy guarding the shared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// No semaphore; exposes the race.
    NoLock,
    /// One binary semaphore used as a mutex.
    MutualExclusion,
    /// Two binary semaphores forming a write/read rendezvous.
    #[default]
    Handshake,
}

impl PolicyKind {
    /// Number of semaphores the policy provisions.
    pub const fn semaphore_count(self) -> usize {
        match self {
            PolicyKind::NoLock => 0,
            PolicyKind::MutualExclusion => 1,
            PolicyKind::Handshake => 2,
        }
    }

    /// Default pattern offset.
    pub const fn default_offset(self) -> i64 {
        match self {
            PolicyKind::NoLock => NO_LOCK_OFFSET,
            PolicyKind::MutualExclusion | PolicyKind::Handshake => LOCKED_OFFSET,
        }
    }

    /// Default cycle bound; `None` runs until a race or cancellation.
    pub const fn default_cycles(self) -> Option<u32> {
        match self {
            PolicyKind::NoLock => None,
            PolicyKind::MutualExclusion => Some(MUTEX_CYCLES),
            PolicyKind::Handshake => Some(HANDSHAKE_CYCLES),
        }
    }

    /// Default cadence.
    pub const fn default_timing(self) -> Timing {
        match self {
            PolicyKind::NoLock => Timing {
                write_idle_ms: NO_LOCK_WRITE_IDLE_MS,
                read_idle_ms: NO_LOCK_READ_IDLE_MS,
                slot_delay_us: NO_LOCK_SLOT_DELAY_US,
            },
            PolicyKind::MutualExclusion => Timing {
                write_idle_ms: MUTEX_IDLE_MS,
                read_idle_ms: MUTEX_IDLE_MS,
                slot_delay_us: 0,
            },
            PolicyKind::Handshake => Timing {
                write_idle_ms: HANDSHAKE_WRITE_IDLE_MS,
                read_idle_ms: HANDSHAKE_READ_IDLE_MS,
                slot_delay_us: 0,
            },
        }
    }

    /// Whether a verification mismatch aborts the peer.
    pub const fn aborts_on_mismatch(self) -> bool {
        matches!(self, PolicyKind::NoLock)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::NoLock => "no_lock",
            PolicyKind::MutualExclusion => "mutual_exclusion",
            PolicyKind::Handshake => "handshake",
        };
        f.write_str(name)
    }
}

/// Role cadence.
///
/// Idle sleeps happen outside every critical section. `slot_delay_us` is the
/// dwell after each slot's intermediate write inside a write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timing {
    /// Producer sleep after each pass [ms].
    pub write_idle_ms: u64,
    /// Consumer sleep after each pass [ms].
    pub read_idle_ms: u64,
    /// Per-slot dwell inside a write pass [µs].
    #[serde(default)]
    pub slot_delay_us: u64,
}

impl Timing {
    /// Producer sleep after each pass.
    pub const fn write_idle(&self) -> Duration {
        Duration::from_millis(self.write_idle_ms)
    }

    /// Consumer sleep after each pass.
    pub const fn read_idle(&self) -> Duration {
        Duration::from_millis(self.read_idle_ms)
    }

    /// Per-slot dwell inside a write pass.
    pub const fn slot_delay(&self) -> Duration {
        Duration::from_micros(self.slot_delay_us)
    }
}

/// System V keys of the IPC objects.
///
/// The mutex and the write-turn semaphore share key 112 by default; only one
/// of them exists in any given run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpcKeys {
    /// Shared segment key.
    pub segment: i32,
    /// Mutual-exclusion semaphore key.
    pub mutex: i32,
    /// Handshake write-turn semaphore key.
    pub write_turn: i32,
    /// Handshake read-turn semaphore key.
    pub read_turn: i32,
}

impl Default for IpcKeys {
    fn default() -> Self {
        Self {
            segment: SHARED_MEM_KEY,
            mutex: MUTEX_SEM_KEY,
            write_turn: WRITE_TURN_SEM_KEY,
            read_turn: READ_TURN_SEM_KEY,
        }
    }
}

impl IpcKeys {
    /// Keys derived from one base: segment = base, semaphores = base + 1, + 1, + 2.
    pub fn from_base(base: i32) -> Result<Self, ConfigError> {
        let (Some(next), Some(last)) = (base.checked_add(1), base.checked_add(2)) else {
            return Err(ConfigError::ValidationError(format!(
                "key base {base} leaves no room for the semaphore keys"
            )));
        };
        Ok(Self {
            segment: base,
            mutex: next,
            write_turn: next,
            read_turn: last,
        })
    }

    /// Check the keys the given policy uses.
    pub fn validate(&self, kind: PolicyKind) -> Result<(), ConfigError> {
        // Key 0 is IPC_PRIVATE and would never be shared between roles.
        let used: Vec<(&str, i32)> = match kind {
            PolicyKind::NoLock => vec![("segment", self.segment)],
            PolicyKind::MutualExclusion => vec![("segment", self.segment), ("mutex", self.mutex)],
            PolicyKind::Handshake => vec![
                ("segment", self.segment),
                ("write_turn", self.write_turn),
                ("read_turn", self.read_turn),
            ],
        };

        if let Some((name, _)) = used.iter().find(|(_, key)| *key == 0) {
            return Err(ConfigError::ValidationError(format!(
                "{name} key cannot be 0 (IPC_PRIVATE)"
            )));
        }

        if kind == PolicyKind::Handshake && self.write_turn == self.read_turn {
            return Err(ConfigError::ValidationError(format!(
                "write_turn and read_turn keys must differ (both {})",
                self.write_turn
            )));
        }
        Ok(())
    }
}

/// Policy selection with optional overrides of the per-policy defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Active policy.
    #[serde(default)]
    pub kind: PolicyKind,
    /// Pattern offset override.
    #[serde(default)]
    pub offset: Option<i64>,
    /// Cycle bound override.
    #[serde(default)]
    pub cycles: Option<u32>,
    /// Cadence override.
    #[serde(default)]
    pub timing: Option<Timing>,
}

impl PolicyConfig {
    /// Policy with all defaults.
    pub const fn new(kind: PolicyKind) -> Self {
        Self {
            kind,
            offset: None,
            cycles: None,
            timing: None,
        }
    }

    /// Effective pattern offset.
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(self.kind.default_offset())
    }

    /// Effective cycle bound.
    pub fn cycles(&self) -> Option<u32> {
        self.cycles.or(self.kind.default_cycles())
    }

    /// Effective cadence.
    pub fn timing(&self) -> Timing {
        self.timing.unwrap_or(self.kind.default_timing())
    }

    /// Validate overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let offset = self.offset();
        if !(0..=MAX_OFFSET).contains(&offset) {
            return Err(ConfigError::ValidationError(format!(
                "offset {offset} outside 0..={MAX_OFFSET}"
            )));
        }
        if self.cycles == Some(0) {
            return Err(ConfigError::ValidationError(
                "cycles must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
