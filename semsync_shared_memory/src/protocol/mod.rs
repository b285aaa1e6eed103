//! Producer/consumer coordination over the shared buffer
//!
//! Both role loops share one skeleton:
//!
//! 1. stop if cancelled or the cycle bound is reached
//! 2. pass the policy's entry gate
//! 3. touch the buffer and notify the observer
//! 4. pass the exit gate
//! 5. (consumer) verify the private snapshot
//! 6. idle
//!
//! Verification and idling always happen outside the critical section.

mod observer;
mod peer;
mod policy;
mod report;
mod role;

pub use observer::{PassEvent, PassObserver, PassRecorder};
pub use peer::PeerLink;
pub use policy::SyncPolicy;
pub use report::{Completion, RoleReport};
pub use role::{Role, RoleContext, RoleState};

use crate::buffer::{Pattern, SharedBuffer};
use crate::error::SyncResult;
use semsync::policy::{PolicyConfig, Timing};

/// Role loops bound to one provisioned policy
#[derive(Debug, Clone, Copy)]
pub struct CoordinationProtocol<'a> {
    policy: &'a SyncPolicy,
    pattern: Pattern,
    cycles: Option<u32>,
    timing: Timing,
}

/// Outcome of a blocking gate
enum Gate {
    Passed,
    Interrupted,
}

impl<'a> CoordinationProtocol<'a> {
    /// Protocol with the effective parameters of `config`
    pub fn new(policy: &'a SyncPolicy, config: &PolicyConfig) -> Self {
        Self {
            policy,
            pattern: Pattern::new(config.offset()),
            cycles: config.cycles(),
            timing: config.timing(),
        }
    }

    /// Pattern written and expected
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Cycle bound, `None` when unbounded
    pub fn cycles(&self) -> Option<u32> {
        self.cycles
    }

    /// Drive the producer loop until cycles run out, the token is cancelled
    /// or a wait is interrupted.
    pub fn run_producer(
        &self,
        ctx: &mut RoleContext,
        buffer: &SharedBuffer,
        observer: &dyn PassObserver,
    ) -> SyncResult<RoleReport> {
        let mut report = RoleReport::new(ctx.role(), self.policy.kind());

        report.completion = loop {
            if let Some(stop) = self.should_stop(ctx, report.passes) {
                break stop;
            }

            ctx.transition(RoleState::WaitingOnGate);
            if let Gate::Interrupted = gate(self.policy.enter_write())? {
                break Completion::Interrupted;
            }

            ctx.transition(RoleState::InCriticalSection);
            buffer.fill(&self.pattern, self.timing.slot_delay());
            observer.pass_written(report.passes);
            self.policy.exit_write()?;
            ctx.transition(RoleState::Idle);

            tracing::debug!(role = %ctx.role(), pass = report.passes, "Pass written");
            report.passes += 1;
            std::thread::sleep(self.timing.write_idle());
        };

        ctx.transition(RoleState::Draining);
        tracing::info!(
            role = %ctx.role(),
            passes = report.passes,
            completion = ?report.completion,
            "Write loop finished"
        );
        Ok(report)
    }

    /// Drive the consumer loop.
    ///
    /// Under `NoLock` the first mismatch raises an abort at `peer` and ends
    /// the loop; under the locked policies mismatches are logged and counted.
    pub fn run_consumer(
        &self,
        ctx: &mut RoleContext,
        buffer: &SharedBuffer,
        peer: &dyn PeerLink,
        observer: &dyn PassObserver,
    ) -> SyncResult<RoleReport> {
        let kind = self.policy.kind();
        let mut report = RoleReport::new(ctx.role(), kind);

        report.completion = loop {
            if let Some(stop) = self.should_stop(ctx, report.passes) {
                break stop;
            }

            ctx.transition(RoleState::WaitingOnGate);
            if let Gate::Interrupted = gate(self.policy.enter_read())? {
                break Completion::Interrupted;
            }

            ctx.transition(RoleState::InCriticalSection);
            let snapshot = buffer.snapshot();
            observer.pass_read(report.passes, &snapshot);
            self.policy.exit_read()?;
            ctx.transition(RoleState::Idle);

            let pass = report.passes;
            report.passes += 1;

            match self.pattern.verify(&snapshot) {
                Ok(()) => tracing::debug!(role = %ctx.role(), pass, "Pass verified"),
                Err(mismatch) if kind.aborts_on_mismatch() => {
                    report.record_mismatch(mismatch);
                    tracing::warn!(%mismatch, "Consumer will exit");
                    if let Err(e) = peer.raise_abort() {
                        tracing::error!(error = %e, "Abort of producer failed");
                    }
                    break Completion::RaceDetected;
                }
                Err(mismatch) => {
                    report.record_mismatch(mismatch);
                    tracing::error!(policy = %kind, pass, %mismatch, "Sequence error");
                }
            }

            std::thread::sleep(self.timing.read_idle());
        };

        ctx.transition(RoleState::Draining);
        tracing::info!(
            role = %ctx.role(),
            passes = report.passes,
            mismatches = report.mismatches,
            completion = ?report.completion,
            "Read loop finished"
        );
        Ok(report)
    }

    fn should_stop(&self, ctx: &RoleContext, passes: u32) -> Option<Completion> {
        if ctx.cancel_token().is_cancelled() {
            return Some(Completion::Cancelled);
        }
        match self.cycles {
            Some(limit) if passes >= limit => Some(Completion::CyclesExhausted),
            _ => None,
        }
    }
}

fn gate(result: SyncResult<()>) -> SyncResult<Gate> {
    match result {
        Ok(()) => Ok(Gate::Passed),
        Err(e) if e.is_interrupted() => {
            tracing::warn!(error = %e, "Gate wait interrupted");
            Ok(Gate::Interrupted)
        }
        Err(e) => Err(e),
    }
}
