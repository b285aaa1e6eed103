//! Concurrency properties of the three policies.
//!
//! Producer and consumer run on two threads of this process; System V
//! semaphores and segments behave the same between threads as between
//! processes.

mod common;

use common::{fast_timing, test_config};
use semsync::policy::{PolicyKind, Timing};
use semsync_shared_memory::{
    CancellationToken, Completion, PassRecorder, Role, RoleContext, Session, Snapshot, SyncResult,
};
use std::time::Duration;

#[test]
fn no_lock_race_is_detected_and_aborts_producer() -> SyncResult<()> {
    const TRIALS: usize = 5;
    let mut raced = 0;

    for _ in 0..TRIALS {
        let timing = Timing {
            write_idle_ms: 5,
            read_idle_ms: 2,
            slot_delay_us: 100,
        };
        // Bounds both roles so a trial without a race still ends.
        let config = test_config(PolicyKind::NoLock, Some(200), timing);
        let session = Session::establish(&config)?;

        // Start from a complete pass: the only torn value left is the doubled one.
        let view = session.segment().attach()?;
        view.fill(&session.protocol().pattern(), Duration::ZERO);
        view.detach()?;

        let producer_token = CancellationToken::new();
        let (written, read) = std::thread::scope(|s| {
            let producer = s.spawn(|| {
                let mut ctx = RoleContext::new(Role::Producer, producer_token.clone());
                session.run_producer(&mut ctx, &())
            });
            let consumer = s.spawn(|| {
                let mut ctx = RoleContext::new(Role::Consumer, CancellationToken::new());
                session.run_consumer(&mut ctx, &producer_token, &())
            });
            (producer.join().unwrap(), consumer.join().unwrap())
        });
        let (written, read) = (written?, read?);
        session.teardown()?;

        if read.completion != Completion::RaceDetected {
            assert_eq!(read.completion, Completion::CyclesExhausted);
            assert_eq!(read.mismatches, 0);
            assert!(!producer_token.is_cancelled());
            continue;
        }

        raced += 1;
        assert_eq!(read.mismatches, 1);
        assert_eq!(written.completion, Completion::Cancelled);
        let mismatch = read.first_mismatch.expect("race reports its mismatch");
        assert_eq!(mismatch.expected, 6500 + mismatch.index as i64);
        assert_eq!(
            mismatch.observed,
            2 * mismatch.expected,
            "torn read must show the intermediate value, got {mismatch}"
        );
    }

    assert!(raced > 0, "no race in {TRIALS} trials");
    Ok(())
}

#[test]
fn mutual_exclusion_never_exposes_a_partial_pass() -> SyncResult<()> {
    let mut timing = fast_timing(1, 1);
    timing.slot_delay_us = 20;
    let config = test_config(PolicyKind::MutualExclusion, Some(100), timing);
    let session = Session::establish(&config)?;
    let producer_token = CancellationToken::new();
    let recorder = PassRecorder::new();

    let (written, read) = std::thread::scope(|s| {
        let producer = s.spawn(|| {
            let mut ctx = RoleContext::new(Role::Producer, producer_token.clone());
            session.run_producer(&mut ctx, &recorder)
        });
        let consumer = s.spawn(|| {
            let mut ctx = RoleContext::new(Role::Consumer, CancellationToken::new());
            session.run_consumer(&mut ctx, &producer_token, &recorder)
        });
        (producer.join().unwrap(), consumer.join().unwrap())
    });
    let (written, read) = (written?, read?);

    assert_eq!(written.passes, 100);
    assert_eq!(read.passes, 100);
    assert_eq!(read.completion, Completion::CyclesExhausted);
    assert!(!producer_token.is_cancelled());

    // Each read sees either nothing yet or one complete pass, never a mix.
    let pattern = session.protocol().pattern().expected_snapshot();
    let empty = Snapshot([0; 16]);
    let snapshots = recorder.snapshots();
    assert!(snapshots.iter().all(|s| *s == pattern || *s == empty));
    let unwritten = snapshots.iter().filter(|s| **s == empty).count() as u32;
    assert_eq!(read.mismatches, unwritten);

    session.teardown()
}

#[test]
fn handshake_alternates_strictly() -> SyncResult<()> {
    let config = test_config(PolicyKind::Handshake, Some(50), fast_timing(1, 2));
    let session = Session::establish(&config)?;
    let producer_token = CancellationToken::new();
    let recorder = PassRecorder::new();

    let (written, read) = std::thread::scope(|s| {
        let consumer = s.spawn(|| {
            let mut ctx = RoleContext::new(Role::Consumer, CancellationToken::new());
            session.run_consumer(&mut ctx, &producer_token, &recorder)
        });
        let producer = s.spawn(|| {
            let mut ctx = RoleContext::new(Role::Producer, producer_token.clone());
            session.run_producer(&mut ctx, &recorder)
        });
        (producer.join().unwrap(), consumer.join().unwrap())
    });
    let (written, read) = (written?, read?);

    assert_eq!(written.passes, 50);
    assert_eq!(read.passes, 50);
    assert_eq!(read.mismatches, 0);
    assert!(recorder.is_strictly_alternating());

    // Final state: write turn handed back, read turn consumed.
    let sems = session.policy().semaphores();
    assert_eq!(sems[0].value()?, 1);
    assert_eq!(sems[1].value()?, 0);

    session.teardown()
}

#[test]
fn cancelled_producer_stops_without_touching_gates() -> SyncResult<()> {
    let config = test_config(PolicyKind::MutualExclusion, None, fast_timing(1, 1));
    let session = Session::establish(&config)?;
    let token = CancellationToken::new();
    token.cancel();

    let mut ctx = RoleContext::new(Role::Producer, token);
    let report = session.run_producer(&mut ctx, &())?;

    assert_eq!(report.passes, 0);
    assert_eq!(report.completion, Completion::Cancelled);
    assert_eq!(session.policy().semaphores()[0].value()?, 1);
    session.teardown()
}

#[test]
fn removed_semaphore_is_fatal_for_a_running_role() -> SyncResult<()> {
    let config = test_config(PolicyKind::Handshake, Some(10), fast_timing(1, 1));
    let session = Session::establish(&config)?;
    let read_turn = session.policy().semaphores()[1];

    let consumer = std::thread::scope(|s| {
        let handle = s.spawn(|| {
            let mut ctx = RoleContext::new(Role::Consumer, CancellationToken::new());
            session.run_consumer(&mut ctx, &CancellationToken::new(), &())
        });
        // The consumer blocks on the read turn: no pass was written.
        std::thread::sleep(Duration::from_millis(50));
        read_turn.destroy()?;
        SyncResult::Ok(handle.join().unwrap())
    })?;

    let err = consumer.unwrap_err();
    assert!(err.is_fatal());
    // Read turn is already gone; the remaining removals still happen.
    let segment_key = session.segment().key();
    assert!(session.teardown().is_err());
    assert!(semsync_shared_memory::SharedSegment::open(segment_key).is_err());
    Ok(())
}
