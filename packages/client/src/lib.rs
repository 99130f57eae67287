//! Interactive CLI client for the chatgate gateway.

pub mod command;
pub mod domain;
pub mod error;
pub mod formatter;
mod runner;
mod session;
mod ui;

pub use domain::{ClientIdentity, ConnectTarget};
pub use error::ClientError;
pub use runner::run_client;
