//! # Semsync Supervisor Binary
//!
//! Runs the producer in this process and the consumer in a forked child,
//! both coordinating over one System V segment under the selected policy.
//!
//! # Usage
//!
//! ```bash
//! # Strict alternation, 50 passes
//! semsync --policy handshake
//!
//! # Expose the race; the consumer aborts the producer on the first torn read
//! semsync --policy no-lock -v
//!
//! # Config file with CLI overrides, JSON reports on stdout
//! semsync --config semsync.toml --cycles 10 --report --json
//! ```

use clap::{Parser, ValueEnum};
use nix::sys::signal::SigSet;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, getppid};
use semsync::prelude::*;
use semsync_shared_memory::platform::is_process_alive;
use semsync_shared_memory::signals::{
    block_abort_signal, install_interrupt_cascade, spawn_abort_listener, unblock_abort_signal,
};
use semsync_shared_memory::{
    CancellationToken, Role, RoleContext, RoleReport, Session, SignalPeer, SyncError, SyncResult,
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status of a participant that hit a fatal error
const FATAL_EXIT: i32 = -1;

/// Semsync - producer/consumer over shared memory and semaphores
#[derive(Parser, Debug)]
#[command(name = "semsync")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Producer/consumer over System V shared memory and semaphores")]
#[command(long_about = None)]
struct Args {
    /// Synchronization policy (overrides the config file)
    #[arg(short, long, value_enum)]
    policy: Option<PolicyArg>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of passes per role
    #[arg(long)]
    cycles: Option<u32>,

    /// Pattern offset
    #[arg(long)]
    offset: Option<i64>,

    /// Base IPC key; semaphores use the following keys
    #[arg(long, value_name = "KEY")]
    key_base: Option<i32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Print each role's report as JSON on stdout
    #[arg(long)]
    report: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    NoLock,
    MutualExclusion,
    Handshake,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::NoLock => PolicyKind::NoLock,
            PolicyArg::MutualExclusion => PolicyKind::MutualExclusion,
            PolicyArg::Handshake => PolicyKind::Handshake,
        }
    }
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            error!("Configuration rejected: {}", e);
            std::process::exit(1);
        }
    };
    setup_tracing(&args, config.shared.log_level);

    if let Err(e) = run(&args, &config) {
        error!(role = %Role::Producer, error = %e, "Fatal error");
        std::process::exit(FATAL_EXIT);
    }
}

fn run(args: &Args, config: &SemsyncConfig) -> SyncResult<()> {
    info!(
        service = %config.shared.service_name,
        policy = %config.policy.kind,
        "Semsync v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let session = Session::establish(config)?;

    // Blocked before fork: both roles and every later thread inherit the mask.
    let abort_mask = if config.policy.kind.aborts_on_mismatch() {
        Some(block_abort_signal()?)
    } else {
        None
    };

    // SAFETY: no thread has been spawned yet, the process is single-threaded.
    match unsafe { fork() }? {
        ForkResult::Child => {
            let code = consumer_role(args, config);
            std::process::exit(code);
        }
        ForkResult::Parent { child } => producer_role(args, session, child, abort_mask),
    }
}

fn producer_role(
    args: &Args,
    session: Session,
    child: Pid,
    abort_mask: Option<SigSet>,
) -> SyncResult<()> {
    info!(%child, "Consumer forked");
    let token = CancellationToken::new();
    // With the abort signal blocked, the self kill of the cascade lands on the
    // listener and becomes a cancel; the child still dies.
    if let Some(mask) = abort_mask {
        spawn_abort_listener(mask, token.clone())?;
    }
    install_interrupt_cascade(Some(child))?;

    let mut ctx = RoleContext::new(Role::Producer, token).with_peer(child);
    let report = session.run_producer(&mut ctx, &())?;
    emit(&report, args.report)?;

    info!(%child, alive = is_process_alive(child), "Waiting for consumer");
    match waitpid(child, None).map_err(|source| SyncError::Signal { source })? {
        WaitStatus::Exited(pid, code) => info!(%pid, code, "Consumer exited"),
        status => warn!(?status, "Consumer ended abnormally"),
    }

    if let Err(e) = session.teardown() {
        warn!(error = %e, "Teardown incomplete");
    }
    info!("Semsync shutdown complete");
    Ok(())
}

fn consumer_role(args: &Args, config: &SemsyncConfig) -> i32 {
    match consume(args, config) {
        Ok(()) => 0,
        Err(e) if !e.is_fatal() => {
            warn!(role = %Role::Consumer, error = %e, "Consumer stopped");
            0
        }
        Err(e) => {
            error!(role = %Role::Consumer, error = %e, "Fatal error");
            FATAL_EXIT
        }
    }
}

fn consume(args: &Args, config: &SemsyncConfig) -> SyncResult<()> {
    if config.policy.kind.aborts_on_mismatch() {
        unblock_abort_signal()?;
    }
    install_interrupt_cascade(None)?;

    let session = Session::join(config)?;
    let owner = SignalPeer::new(getppid());
    let mut ctx = RoleContext::new(Role::Consumer, CancellationToken::new());
    let report = session.run_consumer(&mut ctx, &owner, &())?;
    emit(&report, args.report)
}

fn emit(report: &RoleReport, print: bool) -> SyncResult<()> {
    info!(
        role = %report.role,
        passes = report.passes,
        mismatches = report.mismatches,
        completion = ?report.completion,
        "Role finished"
    );
    if print {
        println!("{}", report.to_json()?);
    }
    Ok(())
}

/// Merge the optional config file with CLI overrides.
fn load_config(args: &Args) -> Result<SemsyncConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => SemsyncConfig::load(path)?,
        None => SemsyncConfig::default(),
    };

    if let Some(policy) = args.policy {
        config.policy.kind = policy.into();
    }
    if let Some(cycles) = args.cycles {
        config.policy.cycles = Some(cycles);
    }
    if let Some(offset) = args.offset {
        config.policy.offset = Some(offset);
    }
    if let Some(base) = args.key_base {
        config.keys = IpcKeys::from_base(base)?;
    }

    config.validate()?;
    Ok(config)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
