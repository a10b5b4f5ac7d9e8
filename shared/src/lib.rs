//! Shared types for the label server
//!
//! Plain data records exchanged between the label server and its external
//! collaborators (template storage, scanner configuration, event log).

pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
pub use models::Driver;
