//! Semsync Common Library
//!
//! This crate provides the constants, IPC keys and configuration loading
//! utilities shared by every semsync workspace crate.
//!
//! # Module Structure
//!
//! - [`consts`] - Buffer geometry, IPC keys, pattern offsets and cadences
//! - [`config`] - Configuration loading traits and types
//! - [`policy`] - Synchronization policy selection, timing and key configuration
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! semsync = { package = "semsync_common", path = "../semsync_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use semsync_common::consts::*;
//! use semsync_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod config;
pub mod consts;
pub mod policy;
pub mod prelude;
