//! Scan handling
//!
//! - [`ScanEventRouter`] - scanned code to printed labels
//! - [`dispatch`] - scanner events to the router
//! - [`provider`] - configuration and event log collaborators

pub mod dispatch;
pub mod provider;
pub mod router;

pub use provider::{
    ConfigResolver, JsonScanConfigSource, JsonlEventSink, MemoryEventSink, ScanEventSink,
    load_scanners,
};
pub use router::{ScanEventRouter, ScanOutcome};
