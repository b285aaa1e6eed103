//! Cross-process coordination and signalling.
//!
//! Uses `fork()` the way the supervisor does: the owner establishes the
//! session and writes, the child joins it and reads. Anything that blocks the
//! abort signal or installs a handler does so in a forked process, never in
//! the multi-threaded test harness.

mod common;

use common::{fast_timing, test_config};
use nix::sys::signal::{Signal, kill};
use nix::unistd::{Pid, getppid};
use semsync::config::SemsyncConfig;
use semsync::policy::{PolicyKind, Timing};
use semsync_shared_memory::signals::{
    block_abort_signal, force_terminate, install_interrupt_cascade, spawn_abort_listener,
    unblock_abort_signal,
};
use semsync_shared_memory::{
    CancellationToken, Completion, Role, RoleContext, Session, SignalPeer, SyncResult,
};
use std::time::Duration;

/// Fork, run `body` in the child and exit with its code.
fn spawn_forked(body: impl FnOnce() -> i32) -> libc::pid_t {
    // Safety: fork() is unsafe but this is a controlled test environment.
    let pid = unsafe { libc::fork() };
    if pid == 0 {
        let code = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body)).unwrap_or(101);
        std::process::exit(code);
    }
    assert!(pid > 0, "fork failed");
    pid
}

/// Raw wait status of a forked child
fn wait_for(pid: libc::pid_t) -> libc::c_int {
    let mut status: libc::c_int = 0;
    unsafe {
        libc::waitpid(pid, &mut status, 0);
    }
    status
}

fn sleeper() -> i32 {
    std::thread::sleep(Duration::from_secs(10));
    1
}

fn assert_killed_by_abort(status: libc::c_int) {
    assert!(libc::WIFSIGNALED(status), "process was not killed (status {status:#x})");
    assert_eq!(libc::WTERMSIG(status), libc::SIGUSR1);
}

#[test]
fn handshake_between_owner_and_child() -> SyncResult<()> {
    let config = test_config(PolicyKind::Handshake, Some(20), fast_timing(1, 2));
    let session = Session::establish(&config)?;

    let pid = spawn_forked(|| {
        match Session::join(&config).and_then(|joined| {
            let mut ctx = RoleContext::new(Role::Consumer, CancellationToken::new());
            joined.run_consumer(&mut ctx, &SignalPeer::new(getppid()), &())
        }) {
            Ok(report) if report.passes == 20 && report.mismatches == 0 => 0,
            Ok(_) => 1,
            Err(_) => 2,
        }
    });

    let mut ctx =
        RoleContext::new(Role::Producer, CancellationToken::new()).with_peer(Pid::from_raw(pid));
    let report = session.run_producer(&mut ctx, &())?;
    assert_eq!(report.passes, 20);
    assert_eq!(report.completion, Completion::CyclesExhausted);

    let status = wait_for(pid);
    assert!(libc::WIFEXITED(status), "child did not exit normally");
    assert_eq!(libc::WEXITSTATUS(status), 0, "child reported a failure");

    session.teardown()
}

/// Owner side of a no-lock run: block the abort signal, fork the consumer,
/// turn its abort into a cancel. Returns 0 when the producer was cancelled and
/// the consumer saw the race.
fn no_lock_owner(config: &SemsyncConfig) -> SyncResult<i32> {
    let session = Session::establish(config)?;
    let view = session.segment().attach()?;
    view.fill(&session.protocol().pattern(), Duration::ZERO);
    view.detach()?;

    let mask = block_abort_signal()?;
    let consumer = spawn_forked(|| {
        let read = unblock_abort_signal()
            .and_then(|()| Session::join(config))
            .and_then(|joined| {
                let mut ctx = RoleContext::new(Role::Consumer, CancellationToken::new());
                joined.run_consumer(&mut ctx, &SignalPeer::new(getppid()), &())
            });
        match read {
            Ok(report) if report.completion == Completion::RaceDetected => 0,
            Ok(_) => 1,
            Err(_) => 2,
        }
    });

    let token = CancellationToken::new();
    spawn_abort_listener(mask, token.clone())?;
    let mut ctx = RoleContext::new(Role::Producer, token).with_peer(Pid::from_raw(consumer));
    let written = session.run_producer(&mut ctx, &())?;

    let status = wait_for(consumer);
    session.teardown()?;

    if !libc::WIFEXITED(status) {
        return Ok(10);
    }
    Ok(match (libc::WEXITSTATUS(status), written.completion) {
        (0, Completion::Cancelled) => 0,
        (0, _) => 11,
        (code, _) => 20 + code,
    })
}

#[test]
fn no_lock_race_cancels_owner_through_abort_signal() {
    let timing = Timing {
        write_idle_ms: 5,
        read_idle_ms: 2,
        slot_delay_us: 100,
    };
    let config = test_config(PolicyKind::NoLock, Some(2_000), timing);

    // The owner gets its own single-threaded process so the blocked mask
    // covers every thread the abort could be delivered to.
    let owner = spawn_forked(|| no_lock_owner(&config).unwrap_or(3));

    let status = wait_for(owner);
    assert!(libc::WIFEXITED(status), "owner was killed (status {status:#x})");
    assert_eq!(libc::WEXITSTATUS(status), 0, "owner reported a failure");
}

#[test]
fn forced_kill_terminates_with_abort_signal() {
    let status = wait_for(spawn_forked(|| {
        if force_terminate(Pid::this()).is_err() {
            return 2;
        }
        sleeper()
    }));
    assert_killed_by_abort(status);
}

#[test]
fn interrupt_cascade_kills_child_then_self() {
    let victim = spawn_forked(sleeper);
    let owner = spawn_forked(|| {
        if install_interrupt_cascade(Some(Pid::from_raw(victim))).is_err() {
            return 2;
        }
        if kill(Pid::this(), Signal::SIGINT).is_err() {
            return 3;
        }
        sleeper()
    });

    assert_killed_by_abort(wait_for(victim));
    assert_killed_by_abort(wait_for(owner));
}

#[test]
fn interrupt_with_blocked_abort_cancels_instead_of_killing() {
    let victim = spawn_forked(sleeper);
    let owner = spawn_forked(|| {
        let token = CancellationToken::new();
        let armed = block_abort_signal()
            .and_then(|mask| spawn_abort_listener(mask, token.clone()))
            .and_then(|listener| {
                install_interrupt_cascade(Some(Pid::from_raw(victim)))?;
                Ok(listener)
            });
        let Ok(listener) = armed else {
            return 2;
        };
        if kill(Pid::this(), Signal::SIGINT).is_err() {
            return 3;
        }
        if listener.join().is_err() {
            return 4;
        }
        if token.is_cancelled() { 0 } else { 1 }
    });

    assert_killed_by_abort(wait_for(victim));
    let status = wait_for(owner);
    assert!(libc::WIFEXITED(status), "owner was killed (status {status:#x})");
    assert_eq!(libc::WEXITSTATUS(status), 0);
}
