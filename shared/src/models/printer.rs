//! Printer Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw port for Zebra printers
pub const ZEBRA_PORT: u16 = 6101;
/// Raw port for SATO printers
pub const SATO_PORT: u16 = 9100;

/// Printer vendor. Selects the TCP port and connection quirks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Driver {
    #[default]
    Zebra,
    /// Resets the connection once a job is received
    Sato,
}

impl Driver {
    pub fn port(self) -> u16 {
        match self {
            Driver::Zebra => ZEBRA_PORT,
            Driver::Sato => SATO_PORT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Driver::Zebra => "zebra",
            Driver::Sato => "sato",
        }
    }
}

impl From<&str> for Driver {
    /// Unknown driver names use the Zebra defaults
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("sato") {
            Driver::Sato
        } else {
            Driver::Zebra
        }
    }
}

impl From<String> for Driver {
    fn from(value: String) -> Self {
        Driver::from(value.as_str())
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known printer reachability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterStatus {
    Online,
    #[default]
    Offline,
}

impl PrinterStatus {
    pub fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }
}

/// Network label printer entity
///
/// Stored in the printer file as a map keyed by id; `id` is filled from the
/// key on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub ip: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub driver: Driver,
    #[serde(default)]
    pub status: PrinterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_print: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous_print: Option<ContinuousPrintState>,
}

impl PrinterRecord {
    /// Whether a continuous job is currently flagged active
    pub fn is_continuous_active(&self) -> bool {
        self.continuous_print.as_ref().is_some_and(|c| c.active)
    }
}

/// Continuous print job state, one per printer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousPrintState {
    pub active: bool,
    /// Identifies the job; a replaced job's loop sees a different id and exits
    pub job_id: String,
    pub zpl: String,
    /// Peel sensor poll interval in milliseconds
    pub poll_interval: u64,
    pub count: u64,
    #[serde(default)]
    pub waiting_for_peel: bool,
    pub started_at: DateTime<Utc>,
}

/// Printer create payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterCreate {
    pub ip: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub driver: Option<Driver>,
}

/// Printer update payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterUpdate {
    pub ip: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub driver: Option<Driver>,
}
