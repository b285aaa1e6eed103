//! # Semsync Shared Memory Coordination
//!
//! Two cooperating processes, a producer (owner) and a consumer (child),
//! exchange a fixed 16-slot buffer through a System V shared segment. Access
//! is coordinated by one of three policies:
//!
//! - **NoLock**: no semaphore. The consumer detects torn passes and aborts
//!   the producer through a signal.
//! - **MutualExclusion**: one binary semaphore; a read never overlaps a write.
//! - **Handshake**: two binary semaphores; writes and reads strictly alternate.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   Producer      │    │  Shared Segment │    │   Consumer      │
//! │                 │    │                 │    │                 │
//! │ run_producer    ├───►│ [i64; 16]       ├───►│ run_consumer    │
//! │                 │    │                 │    │  verify         │
//! └────────┬────────┘    └─────────────────┘    └────────┬────────┘
//!          │             ┌─────────────────┐             │
//!          └────────────►│ SyncPolicy      │◄────────────┘
//!                        │ 0..2 semaphores │
//!                        └─────────────────┘
//!          ◄──────────── SIGUSR1 (race abort) ───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use semsync::config::SemsyncConfig;
//! use semsync::policy::PolicyKind;
//! use semsync_shared_memory::{CancellationToken, Role, RoleContext, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SemsyncConfig::for_policy(PolicyKind::MutualExclusion);
//! let session = Session::establish(&config)?;
//!
//! let mut ctx = RoleContext::new(Role::Producer, CancellationToken::new());
//! let report = session.run_producer(&mut ctx, &())?;
//! println!("{}", report.to_json()?);
//!
//! session.teardown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, SyncError>`. [`SyncError::is_fatal`]
//! separates failures that must end the participant (creation, attach,
//! semaphore operations) from cleanup failures that are reported and
//! skipped (detach, removal, status queries). An interrupted semaphore wait
//! ends the role loop with [`Completion::Interrupted`].
//!
//! ## Platform Support
//!
//! Linux only (System V IPC through `libc`).

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod cancel;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod segment;
pub mod semaphore;
pub mod session;
pub mod signals;

pub use buffer::{Mismatch, Pattern, SharedBuffer, Snapshot};
pub use cancel::CancellationToken;
pub use error::{SyncError, SyncResult};
pub use protocol::{
    Completion, CoordinationProtocol, PassEvent, PassObserver, PassRecorder, PeerLink, Role,
    RoleContext, RoleReport, RoleState, SyncPolicy,
};
pub use segment::{SegmentStat, SegmentView, SharedSegment};
pub use semaphore::Semaphore;
pub use session::Session;
pub use signals::SignalPeer;

/// Install a global subscriber that writes through the test harness capture.
///
/// The filter comes from `RUST_LOG` and falls back to `warn`. Only the first
/// call in a process installs anything.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_test_writer()
        .with_thread_names(true)
        .with_line_number(true)
        .finish();

    // A second test in the same binary finds the subscriber already set.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
