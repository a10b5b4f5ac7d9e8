//! Network label printer client
//!
//! One short-lived TCP connection per operation:
//! - print job (send a ZPL stream, drain any response)
//! - reachability probe (connect only)
//! - peel sensor query (SGD `getvar "sensor.peeler"`)
//! - extended status query (`~HQES`)
//!
//! Every network step runs under a client-side timeout, so a printer that
//! never closes its end cannot stall the caller.

use crate::error::{PrintError, PrintResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

pub use shared::models::{Driver, SATO_PORT, ZEBRA_PORT};

const PEEL_QUERY: &str = "! U1 getvar \"sensor.peeler\"\r\n";
const EXTENDED_STATUS_QUERY: &str = "~HQES\r\n";

/// Resolve the TCP endpoint for a printer address.
///
/// A bare host gets the driver port. An address that already names a port
/// (`host:port`, `[v6]:port`) is used as-is.
pub fn endpoint(address: &str, driver: Driver) -> String {
    let address = address.trim();
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Some((host, port)) = address.rsplit_once(':')
        && !host.is_empty()
        && !host.contains(':')
        && port.parse::<u16>().is_ok()
    {
        return address.to_string();
    }
    if address.contains(':') && !address.starts_with('[') {
        // Bare IPv6 literal
        return format!("[{}]:{}", address, driver.port());
    }
    format!("{}:{}", address, driver.port())
}

/// Client timeouts
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    /// Connect and write timeout for print jobs
    pub send_timeout: Duration,
    /// Connect timeout for probes and status queries
    pub probe_timeout: Duration,
    /// How long to collect a status query response
    pub query_window: Duration,
    /// How long to drain a print connection after the write completes
    pub close_grace: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
            query_window: Duration::from_millis(500),
            close_grace: Duration::from_secs(1),
        }
    }
}

/// Reachability probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStatus {
    pub online: bool,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeStatus {
    pub fn online() -> Self {
        Self {
            online: true,
            reachable: true,
            error: None,
        }
    }

    pub fn offline(error: impl Into<String>) -> Self {
        Self {
            online: false,
            reachable: false,
            error: Some(error.into()),
        }
    }
}

/// Peel sensor reading (`sensor.peeler`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeelSensorReading {
    pub raw_response: String,
    pub sensor_value: String,
    /// `clear`: the presented label was removed
    pub label_taken: bool,
    /// `present`: a label sits at the peel position
    pub label_at_peel_position: bool,
}

/// Parse an SGD `sensor.peeler` response
pub fn parse_peel_response(raw: &str) -> PeelSensorReading {
    let value = raw.trim().replace('"', "").to_lowercase();
    PeelSensorReading {
        raw_response: raw.to_string(),
        label_taken: value == "clear",
        label_at_peel_position: value == "present",
        sensor_value: value,
    }
}

/// Decoded `~HQES` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedStatus {
    pub raw_response: String,
    pub values: Vec<String>,
    pub paper_out: bool,
    pub paused: bool,
    pub ribbon_out: bool,
    pub label_at_peel_position: bool,
    pub label_taken: bool,
}

/// Parse a comma-separated `~HQES` response.
///
/// Field 1 is paper out, field 2 paused, field 7 ribbon out. A paused
/// printer in peel mode is holding a label at the peel position.
pub fn parse_extended_status(raw: &str) -> ExtendedStatus {
    let values: Vec<String> = raw.trim().split(',').map(str::to_string).collect();
    let flag = |i: usize| values.get(i).is_some_and(|v| v == "1");

    let paper_out = flag(1);
    let paused = flag(2);
    let ribbon_out = flag(7);

    ExtendedStatus {
        raw_response: raw.to_string(),
        paper_out,
        paused,
        ribbon_out,
        label_at_peel_position: paused,
        label_taken: !paused,
        values,
    }
}

/// Printer transport used by the label server
#[async_trait]
pub trait PrinterClient: Send + Sync {
    /// Send a print job. Returns whatever the printer wrote back.
    async fn send(&self, address: &str, driver: Driver, payload: &str) -> PrintResult<String>;

    /// Connect-only reachability check. Never fails.
    async fn probe(&self, address: &str, driver: Driver) -> ProbeStatus;

    /// Query the peel sensor
    async fn peel_sensor(&self, address: &str, driver: Driver) -> PrintResult<PeelSensorReading>;

    /// Query the extended status flags
    async fn extended_status(&self, address: &str, driver: Driver) -> PrintResult<ExtendedStatus>;
}

/// TCP printer client
#[derive(Debug, Clone, Default)]
pub struct NetworkPrinterClient {
    settings: ClientSettings,
}

fn is_reset(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

impl NetworkPrinterClient {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn connect(endpoint: &str, limit: Duration) -> PrintResult<TcpStream> {
        tokio::time::timeout(limit, TcpStream::connect(endpoint))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", endpoint)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", endpoint, e)))
    }

    /// Read until EOF, reset, or the window closes.
    async fn drain(stream: &mut TcpStream, window: Duration) -> String {
        let deadline = Instant::now() + window;
        let mut response = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => response.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    if is_reset(e.kind()) {
                        debug!("printer reset connection after data sent");
                    } else {
                        debug!(error = %e, "read after write failed");
                    }
                    break;
                }
            }
        }

        String::from_utf8_lossy(&response).into_owned()
    }

    /// Send a ZPL stream.
    ///
    /// Once the payload is fully written the job counts as delivered: SATO
    /// printers get an immediate write shutdown and usually reset the
    /// connection, Zebra printers are given the close grace to answer.
    #[instrument(skip(self, payload), fields(addr = %endpoint(address, driver), driver = %driver, len = payload.len()))]
    pub async fn send_job(&self, address: &str, driver: Driver, payload: &str) -> PrintResult<String> {
        let endpoint = endpoint(address, driver);
        let mut stream = Self::connect(&endpoint, self.settings.send_timeout).await?;
        info!("Connected, sending {} bytes", payload.len());

        match tokio::time::timeout(self.settings.send_timeout, stream.write_all(payload.as_bytes())).await {
            Err(_) => return Err(PrintError::Timeout(format!("Write timeout: {}", endpoint))),
            Ok(Err(e)) if is_reset(e.kind()) => {
                return Err(PrintError::ConnectionReset(format!("{}: {}", endpoint, e)));
            }
            Ok(Err(e)) => return Err(PrintError::Io(e)),
            Ok(Ok(())) => {}
        }

        if driver == Driver::Sato
            && let Err(e) = stream.shutdown().await
        {
            debug!(error = %e, "shutdown after write failed");
        }

        let response = Self::drain(&mut stream, self.settings.close_grace).await;
        if driver != Driver::Sato
            && let Err(e) = stream.shutdown().await
        {
            debug!(error = %e, "shutdown after drain failed");
        }

        info!("Print job sent successfully");
        Ok(response)
    }

    #[instrument(skip(self), fields(addr = %endpoint(address, driver)))]
    pub async fn check_online(&self, address: &str, driver: Driver) -> ProbeStatus {
        let endpoint = endpoint(address, driver);
        match Self::connect(&endpoint, self.settings.probe_timeout).await {
            Ok(_) => {
                info!("Printer online");
                ProbeStatus::online()
            }
            Err(PrintError::Timeout(_)) => {
                warn!("Printer check timeout");
                ProbeStatus::offline("Connection timeout")
            }
            Err(e) => {
                warn!(error = %e, "Printer offline");
                ProbeStatus::offline(e.to_string())
            }
        }
    }

    /// Write a query command and collect the response for the query window.
    #[instrument(skip(self, command), fields(addr = %endpoint(address, driver)))]
    pub async fn query(&self, address: &str, driver: Driver, command: &str) -> PrintResult<String> {
        let endpoint = endpoint(address, driver);
        let mut stream = Self::connect(&endpoint, self.settings.probe_timeout).await?;

        tokio::time::timeout(self.settings.probe_timeout, stream.write_all(command.as_bytes()))
            .await
            .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", endpoint)))??;

        let response = Self::drain(&mut stream, self.settings.query_window).await;
        debug!(response = %response.trim(), "query response");
        Ok(response)
    }
}

#[async_trait]
impl PrinterClient for NetworkPrinterClient {
    async fn send(&self, address: &str, driver: Driver, payload: &str) -> PrintResult<String> {
        self.send_job(address, driver, payload).await
    }

    async fn probe(&self, address: &str, driver: Driver) -> ProbeStatus {
        self.check_online(address, driver).await
    }

    async fn peel_sensor(&self, address: &str, driver: Driver) -> PrintResult<PeelSensorReading> {
        let raw = self.query(address, driver, PEEL_QUERY).await?;
        Ok(parse_peel_response(&raw))
    }

    async fn extended_status(&self, address: &str, driver: Driver) -> PrintResult<ExtendedStatus> {
        let raw = self.query(address, driver, EXTENDED_STATUS_QUERY).await?;
        Ok(parse_extended_status(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fast_settings() -> ClientSettings {
        ClientSettings {
            send_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(1),
            query_window: Duration::from_millis(200),
            close_grace: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(endpoint("192.168.1.50", Driver::Zebra), "192.168.1.50:6101");
        assert_eq!(endpoint("192.168.1.50", Driver::Sato), "192.168.1.50:9100");
        assert_eq!(endpoint("127.0.0.1:4000", Driver::Sato), "127.0.0.1:4000");
        assert_eq!(endpoint("printer.local", Driver::Zebra), "printer.local:6101");
        assert_eq!(endpoint("::1", Driver::Zebra), "[::1]:6101");
    }

    #[test]
    fn test_parse_peel_response() {
        let r = parse_peel_response("\"clear\"\r\n");
        assert_eq!(r.sensor_value, "clear");
        assert!(r.label_taken);
        assert!(!r.label_at_peel_position);

        let r = parse_peel_response("PRESENT");
        assert!(!r.label_taken);
        assert!(r.label_at_peel_position);

        let r = parse_peel_response("?");
        assert!(!r.label_taken && !r.label_at_peel_position);
    }

    #[test]
    fn test_parse_extended_status() {
        let s = parse_extended_status("PRINTER STATUS,1,1,0,0,0,0,1\r\n");
        assert!(s.paper_out);
        assert!(s.paused);
        assert!(s.ribbon_out);
        assert!(s.label_at_peel_position);
        assert!(!s.label_taken);

        let s = parse_extended_status("");
        assert!(!s.paused);
        assert!(s.label_taken);
    }

    #[tokio::test]
    async fn test_send_collects_payload_and_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"OK").await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let client = NetworkPrinterClient::new(fast_settings());
        let response = client.send(&addr, Driver::Zebra, "^XA^XZ").await.unwrap();
        assert_eq!(response, "OK");
        assert_eq!(server.await.unwrap(), "^XA^XZ");
    }

    #[tokio::test]
    async fn test_send_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = NetworkPrinterClient::new(fast_settings());
        assert!(client.send(&addr, Driver::Zebra, "^XA^XZ").await.is_err());

        let probe = client.probe(&addr, Driver::Zebra).await;
        assert!(!probe.online);
        assert!(probe.error.is_some());
    }

    #[tokio::test]
    async fn test_peel_query_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).contains("sensor.peeler"));
            socket.write_all(b"\"clear\"").await.unwrap();
            // Hold the connection open; the client must stop at the query window
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let client = NetworkPrinterClient::new(fast_settings());
        let started = std::time::Instant::now();
        let reading = client.peel_sensor(&addr, Driver::Zebra).await.unwrap();
        assert!(reading.label_taken);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
