//! Participant roles and their lifecycle

use crate::cancel::CancellationToken;
use nix::unistd::Pid;
use serde::Serialize;
use std::fmt;

/// Which side of the buffer a participant drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owner; writes the pattern
    Producer,
    /// Child; reads and verifies
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Role lifecycle.
///
/// `Idle -> WaitingOnGate -> InCriticalSection -> Idle` per pass, then
/// `Draining -> Terminated` once the loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleState {
    /// Between passes
    #[default]
    Idle,
    /// Blocked on the policy's entry gate
    WaitingOnGate,
    /// Holding the gate and touching the buffer
    InCriticalSection,
    /// Loop finished, detaching
    Draining,
    /// Detached
    Terminated,
}

/// Per-role runtime context
#[derive(Debug, Clone)]
pub struct RoleContext {
    role: Role,
    peer: Option<Pid>,
    cancel: CancellationToken,
    state: RoleState,
}

impl RoleContext {
    /// Context for `role`, stopped through `cancel`
    pub fn new(role: Role, cancel: CancellationToken) -> Self {
        Self {
            role,
            peer: None,
            cancel,
            state: RoleState::Idle,
        }
    }

    /// Record the child process this role owns
    pub fn with_peer(mut self, peer: Pid) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Child process, if this role spawned one
    pub fn peer(&self) -> Option<Pid> {
        self.peer
    }

    /// Cancellation token checked at every loop head
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current lifecycle state
    pub fn state(&self) -> RoleState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: RoleState) {
        tracing::trace!(role = %self.role, from = ?self.state, to = ?next, "Role state");
        self.state = next;
    }
}
