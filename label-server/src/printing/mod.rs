//! Printing
//!
//! - [`compiler`] - label elements to ZPL
//! - [`variables`] - template variable substitution
//! - [`registry`] - JSON-file printer table
//! - [`service`] - ad hoc printer operations
//! - [`continuous`] - peel-sensor driven continuous printing

pub mod compiler;
pub mod continuous;
pub mod registry;
pub mod service;
pub mod variables;

#[cfg(test)]
pub(crate) mod testing;

pub use compiler::{compile, resolve_elements};
pub use continuous::{ContinuousPrintManager, ContinuousStart, ContinuousStatus, QUEUE_TARGET};
pub use registry::{PrinterRegistry, RegistryError, RegistryResult, new_printer_id};
pub use service::{BulkPrintResult, PrinterService};
pub use variables::{RenderContext, substitute};
