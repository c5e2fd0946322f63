#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Platform abstraction layer for kiln
//!
//! This crate provides the seams between the evaluator and the host:
//! - Process execution behind the [`ProcessOperations`] trait, with event
//!   emission and per-command timeouts
//! - Host detection (OS family, release version, architecture)
//! - Atomic file replacement used when writing patched sources

pub mod core;
pub mod fs;
pub mod host;
pub mod implementations;
pub mod process;

pub use core::{Platform, PlatformContext};
pub use host::detect_host;
pub use implementations::host::HostProcessOperations;

/// Re-export commonly used types
pub use process::{CommandOutput, PlatformCommand, ProcessOperations};
