//! Scan Event Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate outcome of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Every configuration printed or was skipped
    Success,
    /// At least one configuration failed
    Partial,
    /// No configuration matched the code
    NoConfig,
}

/// Scan event log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: String,
    pub scanner_id: String,
    pub license_plate_code: String,
    pub status: ScanStatus,
    pub labels_printed: u32,
    pub created_at: DateTime<Utc>,
}

/// Per-configuration result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintResultStatus {
    Success,
    Skipped,
    Error,
}

/// Result of one matched configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJobResult {
    pub group: String,
    pub status: PrintResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copies: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PrintJobResult {
    pub fn success(group: impl Into<String>, printer: impl Into<String>, copies: u32) -> Self {
        Self {
            group: group.into(),
            status: PrintResultStatus::Success,
            printer: Some(printer.into()),
            copies: Some(copies),
            reason: None,
        }
    }

    pub fn skipped(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            status: PrintResultStatus::Skipped,
            printer: None,
            copies: None,
            reason: Some(reason.into()),
        }
    }

    pub fn error(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            status: PrintResultStatus::Error,
            printer: None,
            copies: None,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&ScanStatus::NoConfig).unwrap(), "\"no_config\"");
        assert_eq!(serde_json::to_string(&PrintResultStatus::Skipped).unwrap(), "\"skipped\"");

        let json = serde_json::to_value(PrintJobResult::skipped("Line 1", "No printer assigned")).unwrap();
        assert_eq!(json["reason"], "No printer assigned");
        assert!(json.get("printer").is_none());
    }
}
