//! Utilities - error types and logging
//!
//! - [`AppError`] - application error type
//! - [`logger`] - tracing subscriber setup

pub mod error;
pub mod logger;

pub use error::{AppError, AppResult};
