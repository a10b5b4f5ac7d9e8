//! Unified error handling
//!
//! [`AppError`] is the server-level error. Component errors convert into it
//! with `?`:
//!
//! | Source | Variant |
//! |--------|---------|
//! | printer client | [`AppError::Printer`] |
//! | printer registry file | [`AppError::Registry`] |
//!
//! Expected failures on the scan path (no config, missing printer, device
//! unreachable) are reported as structured outcomes, not as `AppError`.

use crate::printing::RegistryError;
use zpl_printer::PrintError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Printer(#[from] PrintError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;
