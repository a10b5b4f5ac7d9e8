//! Network scanner links
//!
//! - [`ScannerLinkManager`] - one persistent TCP connection per scanner,
//!   reconnect with backoff, liveness sweep
//! - [`LineFramer`] - byte stream to lines
//! - [`parse_scan_line`] - `star;...stop;` wire format

pub mod framing;
pub mod manager;
pub mod wire;

pub use framing::LineFramer;
pub use manager::{ConnectionTest, LinkSnapshot, ScannerLinkManager, reconnect_delay};
pub use wire::parse_scan_line;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Scanner link settings
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    /// Base reconnect delay, multiplied by `min(error_count + 1, 5)`
    pub reconnect_delay: Duration,
    /// Consecutive errors after which reconnecting stops
    pub max_errors: u32,
    pub health_interval: Duration,
    /// Read inactivity that gets logged on a connected link
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub keepalive: Duration,
    /// Connect timeout for one-shot connection tests
    pub test_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            max_errors: 10,
            health_interval: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            keepalive: Duration::from_secs(10),
            test_timeout: Duration::from_secs(5),
        }
    }
}

/// Link state of a managed scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
    /// Operator disconnect; no automatic reconnect from here
    Disconnecting,
    /// Reported for ids the manager does not track
    NotManaged,
}

impl LinkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Connecting => "connecting",
            LinkStatus::Connected => "connected",
            LinkStatus::Disconnected => "disconnected",
            LinkStatus::Error => "error",
            LinkStatus::Disconnecting => "disconnecting",
            LinkStatus::NotManaged => "not_managed",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications from the link manager, FIFO per scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerEvent {
    Connected { scanner_id: String },
    Disconnected { scanner_id: String },
    /// One complete, trimmed line
    Data { scanner_id: String, line: String },
    Error { scanner_id: String, message: String },
}

impl ScannerEvent {
    pub fn scanner_id(&self) -> &str {
        match self {
            ScannerEvent::Connected { scanner_id }
            | ScannerEvent::Disconnected { scanner_id }
            | ScannerEvent::Data { scanner_id, .. }
            | ScannerEvent::Error { scanner_id, .. } => scanner_id,
        }
    }
}

/// Scanner configuration problems found before connecting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("Scanner {0} is not a network scanner")]
    NotNetwork(String),

    #[error("Scanner {0} has no connection string")]
    MissingConnectionString(String),

    #[error("Invalid connection string format (expected host:port): {0}")]
    InvalidConnectionString(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Split a `host:port` connection string
pub fn parse_connection_string(value: &str) -> Result<(String, u16), LinkError> {
    let parts: Vec<&str> = value.split(':').collect();
    let [host, port] = parts.as_slice() else {
        return Err(LinkError::InvalidConnectionString(value.to_string()));
    };
    let host = host.trim();
    if host.is_empty() {
        return Err(LinkError::InvalidConnectionString(value.to_string()));
    }
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|_| LinkError::InvalidPort(port.to_string()))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection_string() {
        assert_eq!(
            parse_connection_string("10.0.0.9:2001"),
            Ok(("10.0.0.9".to_string(), 2001))
        );
        assert!(matches!(
            parse_connection_string("10.0.0.9"),
            Err(LinkError::InvalidConnectionString(_))
        ));
        assert!(matches!(
            parse_connection_string("a:b:c"),
            Err(LinkError::InvalidConnectionString(_))
        ));
        assert!(matches!(
            parse_connection_string("10.0.0.9:http"),
            Err(LinkError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(LinkStatus::NotManaged.to_string(), "not_managed");
        assert_eq!(
            serde_json::to_string(&LinkStatus::Disconnecting).unwrap(),
            "\"disconnecting\""
        );
    }
}
