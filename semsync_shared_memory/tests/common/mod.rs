//! Helpers shared by the integration tests

#![allow(dead_code)]

use semsync::config::SemsyncConfig;
use semsync::policy::{IpcKeys, PolicyConfig, PolicyKind, Timing};
use std::sync::atomic::{AtomicI32, Ordering};

static KEY_COUNTER: AtomicI32 = AtomicI32::new(0);

/// Unique key base for this test process; three consecutive keys are free.
///
/// Also installs the tracing subscriber, so every IPC test logs under
/// `RUST_LOG`.
pub fn test_key() -> i32 {
    semsync_shared_memory::init_tracing();
    let pid = std::process::id() as i32 & 0x3FFF;
    let n = KEY_COUNTER.fetch_add(4, Ordering::SeqCst) & 0xFFC;
    0x4000_0000 | (pid << 12) | n
}

/// Configuration on fresh keys with fast cadence
pub fn test_config(kind: PolicyKind, cycles: Option<u32>, timing: Timing) -> SemsyncConfig {
    let mut config = SemsyncConfig::for_policy(kind);
    config.keys = IpcKeys::from_base(test_key()).expect("test keys stay below i32::MAX");
    config.policy = PolicyConfig {
        kind,
        offset: None,
        cycles,
        timing: Some(timing),
    };
    config
}

/// Millisecond idles, no slot dwell
pub fn fast_timing(write_idle_ms: u64, read_idle_ms: u64) -> Timing {
    Timing {
        write_idle_ms,
        read_idle_ms,
        slot_delay_us: 0,
    }
}
