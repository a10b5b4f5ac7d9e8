//! Data models
//!
//! Records are serialized with serde; printer records keep the camelCase
//! layout of the printer file, the rest use snake_case like the database
//! rows they are read from.

pub mod label;
pub mod printer;
pub mod product;
pub mod scan_config;
pub mod scan_event;
pub mod scanner;

// Re-exports
pub use label::*;
pub use printer::*;
pub use product::*;
pub use scan_config::*;
pub use scan_event::*;
pub use scanner::*;
