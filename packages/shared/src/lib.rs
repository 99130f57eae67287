//! Shared utilities for the chatgate server and client binaries.

pub mod logger;
pub mod time;
