//! Guest assembly error types.

use thiserror::Error;

/// Errors that can occur while assembling a guest module.
#[derive(Debug, Error)]
pub enum GuestGenError {
    /// The static data does not fit below the value stack.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The assembled module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),

    /// Two exports ended up with the same name.
    #[error("duplicate export name: {0}")]
    DuplicateExport(String),
}

/// Guest assembly result type alias.
pub type GuestGenResult<T> = Result<T, GuestGenError>;
