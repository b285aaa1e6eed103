//! Cross-process abort signalling
//!
//! Two paths exist and stay separate:
//!
//! - **Cooperative**: the consumer raises `SIGUSR1` at the producer on a
//!   detected race. The producer blocks that signal and a listener thread
//!   turns it into a [`CancellationToken`] cancel, so the write loop stops at
//!   its next loop head.
//! - **Forced**: an interrupt (`SIGINT`) forwards `SIGUSR1` to the child role
//!   (if this process owns one), then raises it at itself. With the default
//!   disposition the signal terminates the process; semaphores held at that
//!   moment are not released. A process that blocks the signal for a listener
//!   gets a cancel instead and winds down through its normal path.

use crate::cancel::CancellationToken;
use crate::error::SyncResult;
use crate::platform::get_current_pid;
use crate::protocol::PeerLink;
use nix::sys::signal::{SigSet, Signal, kill};
use nix::unistd::Pid;
use std::thread::JoinHandle;

/// Signal carrying both the race abort and the forced kill
pub const ABORT_SIGNAL: Signal = Signal::SIGUSR1;

/// Send the abort signal to a process
pub fn send_abort(pid: Pid) -> SyncResult<()> {
    kill(pid, ABORT_SIGNAL)?;
    Ok(())
}

/// Forced-kill primitive: raise the abort signal at a process whose
/// disposition for it is the default (terminate).
pub fn force_terminate(pid: Pid) -> SyncResult<()> {
    tracing::warn!(%pid, "Killing process");
    send_abort(pid)
}

/// Block the abort signal in the calling thread.
///
/// Must run before the process forks or spawns threads so that every thread
/// inherits the mask and only the listener ever consumes the signal.
pub fn block_abort_signal() -> SyncResult<SigSet> {
    let mut mask = SigSet::empty();
    mask.add(ABORT_SIGNAL);
    mask.thread_block()?;
    Ok(mask)
}

/// Undo [`block_abort_signal`] in the calling thread
pub fn unblock_abort_signal() -> SyncResult<()> {
    let mut mask = SigSet::empty();
    mask.add(ABORT_SIGNAL);
    mask.thread_unblock()?;
    Ok(())
}

/// Spawn the thread that turns a received abort signal into a cancel.
///
/// `mask` must already be blocked (see [`block_abort_signal`]).
pub fn spawn_abort_listener(mask: SigSet, token: CancellationToken) -> SyncResult<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("abort-listener".into())
        .spawn(move || match mask.wait() {
            Ok(signal) => {
                tracing::warn!(?signal, "Abort signal received, cancelling");
                token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Abort listener failed"),
        })?;
    Ok(handle)
}

/// Install the interrupt cascade for this process.
///
/// `child` is the process this one spawned, if any. On interrupt the child is
/// killed first, then this process.
pub fn install_interrupt_cascade(child: Option<Pid>) -> SyncResult<()> {
    ctrlc::set_handler(move || {
        let me = get_current_pid();
        match child {
            Some(child) => {
                tracing::warn!(pid = %me, %child, "Owner kill request, killing child");
                if let Err(e) = force_terminate(child) {
                    tracing::error!(error = %e, "Child kill failed");
                }
            }
            None => tracing::warn!(pid = %me, "Child kill request"),
        }
        if let Err(e) = force_terminate(me) {
            tracing::error!(error = %e, "Self kill failed");
        }
    })?;
    Ok(())
}

/// Peer reached through the abort signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPeer {
    pid: Pid,
}

impl SignalPeer {
    /// Peer process
    pub const fn new(pid: Pid) -> Self {
        Self { pid }
    }

    /// Peer pid
    pub const fn pid(&self) -> Pid {
        self.pid
    }
}

impl PeerLink for SignalPeer {
    fn raise_abort(&self) -> SyncResult<()> {
        send_abort(self.pid)
    }
}
