//! Domain errors.

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// The value was empty or only whitespace
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// The value exceeded the maximum allowed length
    #[error("{field} is too long: {len} > {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
