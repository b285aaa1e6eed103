//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use semsync_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use semsync_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SemsyncConfig, SharedConfig};
pub use crate::policy::{IpcKeys, PolicyConfig, PolicyKind, Timing};

// ─── Buffer Geometry ────────────────────────────────────────────────
pub use crate::consts::{BUFFER_LEN, SEGMENT_SIZE};
