//! Core module - configuration, state and background tasks
//!
//! - [`Config`] - server configuration
//! - [`ServerState`] - shared component handles
//! - [`BackgroundTasks`] - supervised long-lived loops

pub mod config;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
