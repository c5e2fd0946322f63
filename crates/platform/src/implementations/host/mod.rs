//! Implementations backed by the real operating system

pub mod process;

pub use process::HostProcessOperations;
