//! Common error types for briefcast

use thiserror::Error;

/// Common result type for briefcast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across briefcast services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("{0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
