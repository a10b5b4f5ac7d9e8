//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error (refused, unreachable, DNS)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer reset the connection before the payload was fully written
    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Image could not be decoded or converted to a graphic field
    #[error("Image conversion failed: {0}")]
    Image(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
