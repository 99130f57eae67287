//! `MessagePusher` implementations.
//!
//! - `registry`: in-process room registry fanning out over bounded queues

pub mod registry;

pub use registry::ConnectionRegistry;
