//! Outcome of one role run

use super::role::Role;
use crate::buffer::Mismatch;
use crate::error::SyncResult;
use semsync::policy::PolicyKind;
use serde::Serialize;

/// Why a role loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// All configured passes done
    CyclesExhausted,
    /// Consumer saw a torn pass and aborted the producer
    RaceDetected,
    /// Cancellation token observed at a loop head
    Cancelled,
    /// A blocking wait was interrupted by a signal
    Interrupted,
}

/// Summary of a role run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleReport {
    /// Reporting role
    pub role: Role,
    /// Policy in force
    pub policy: PolicyKind,
    /// Completed passes
    pub passes: u32,
    /// Read passes that failed verification
    pub mismatches: u32,
    /// First failed verification, if any
    pub first_mismatch: Option<Mismatch>,
    /// Stop reason
    pub completion: Completion,
}

impl RoleReport {
    pub(crate) fn new(role: Role, policy: PolicyKind) -> Self {
        Self {
            role,
            policy,
            passes: 0,
            mismatches: 0,
            first_mismatch: None,
            completion: Completion::CyclesExhausted,
        }
    }

    pub(crate) fn record_mismatch(&mut self, mismatch: Mismatch) {
        self.mismatches += 1;
        self.first_mismatch.get_or_insert(mismatch);
    }

    /// Single-line JSON form
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
