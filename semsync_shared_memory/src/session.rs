//! IPC objects of one run: the segment plus the policy's semaphores

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    CoordinationProtocol, PassObserver, PeerLink, RoleContext, RoleReport, RoleState, SyncPolicy,
};
use crate::segment::{SegmentView, SharedSegment};
use semsync::config::SemsyncConfig;
use semsync::consts::SEGMENT_SIZE;
use semsync::policy::PolicyConfig;

/// Everything both roles share for one run.
///
/// The owner calls [`establish`](Self::establish) before spawning the other
/// role and [`teardown`](Self::teardown) after it has exited. A participant
/// started separately resolves the same objects with [`join`](Self::join).
#[derive(Debug, Clone)]
pub struct Session {
    policy_config: PolicyConfig,
    segment: SharedSegment,
    policy: SyncPolicy,
}

impl Session {
    /// Validate `config`, create the segment and provision the policy
    pub fn establish(config: &SemsyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let segment = SharedSegment::create(config.keys.segment, SEGMENT_SIZE)?;
        let policy = SyncPolicy::provision(config.policy.kind, &config.keys)?;
        tracing::info!(
            policy = %policy.kind(),
            segment = segment.id(),
            semaphores = policy.kind().semaphore_count(),
            offset = config.policy.offset(),
            cycles = ?config.policy.cycles(),
            "Session established"
        );
        Ok(Self {
            policy_config: config.policy.clone(),
            segment,
            policy,
        })
    }

    /// Resolve objects provisioned by another participant
    pub fn join(config: &SemsyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let segment = SharedSegment::open(config.keys.segment)?;
        let policy = SyncPolicy::open(config.policy.kind, &config.keys)?;
        Ok(Self {
            policy_config: config.policy.clone(),
            segment,
            policy,
        })
    }

    /// Shared segment
    pub fn segment(&self) -> &SharedSegment {
        &self.segment
    }

    /// Provisioned policy
    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Role loops for this session
    pub fn protocol(&self) -> CoordinationProtocol<'_> {
        CoordinationProtocol::new(&self.policy, &self.policy_config)
    }

    /// Attach, run the write loop, detach
    pub fn run_producer(
        &self,
        ctx: &mut RoleContext,
        observer: &dyn PassObserver,
    ) -> SyncResult<RoleReport> {
        let view = self.segment.attach()?;
        let report = self.protocol().run_producer(ctx, &view, observer);
        finish(ctx, view);
        report
    }

    /// Attach, run the read loop, detach
    pub fn run_consumer(
        &self,
        ctx: &mut RoleContext,
        peer: &dyn PeerLink,
        observer: &dyn PassObserver,
    ) -> SyncResult<RoleReport> {
        let view = self.segment.attach()?;
        let report = self.protocol().run_consumer(ctx, &view, peer, observer);
        finish(ctx, view);
        report
    }

    /// Remove the semaphores and the segment.
    ///
    /// Every removal is attempted; the first failure is returned.
    pub fn teardown(self) -> SyncResult<()> {
        let mut first: Option<SyncError> = None;
        if let Err(e) = self.policy.teardown() {
            first.get_or_insert(e);
        }
        if let Err(e) = self.segment.destroy() {
            tracing::warn!(error = %e, "Memory segment removal failed");
            first.get_or_insert(e);
        }
        first.map_or(Ok(()), Err)
    }
}

fn finish(ctx: &mut RoleContext, view: SegmentView) {
    ctx.transition(RoleState::Draining);
    if let Err(e) = view.detach() {
        tracing::error!(role = %ctx.role(), error = %e, "Memory detaching error");
    }
    ctx.transition(RoleState::Terminated);
}
