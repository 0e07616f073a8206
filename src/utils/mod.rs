//! Shared helpers for binaries and transports.

pub mod bootstrap;
pub mod retry;
