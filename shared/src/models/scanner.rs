//! Scanner Model

use serde::{Deserialize, Serialize};

/// How a scanner is attached. Only `network` scanners are managed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionKind {
    #[default]
    Network,
    Usb,
    Serial,
    Other(String),
}

impl From<String> for ConnectionKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "network" => Self::Network,
            "usb" => Self::Usb,
            "serial" => Self::Serial,
            _ => Self::Other(value),
        }
    }
}

impl From<ConnectionKind> for String {
    fn from(value: ConnectionKind) -> Self {
        match value {
            ConnectionKind::Network => "network".to_string(),
            ConnectionKind::Usb => "usb".to_string(),
            ConnectionKind::Serial => "serial".to_string(),
            ConnectionKind::Other(other) => other,
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub connection_type: ConnectionKind,
    /// `host:port` for network scanners
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ScannerConfig {
    pub fn is_network(&self) -> bool {
        self.connection_type == ConnectionKind::Network
    }

    /// Enabled network scanner with a connection string
    pub fn is_managed(&self) -> bool {
        self.enabled
            && self.is_network()
            && self.connection_string.as_deref().is_some_and(|s| !s.is_empty())
    }
}
