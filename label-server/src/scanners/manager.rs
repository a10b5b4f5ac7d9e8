//! Scanner link manager
//!
//! Owns one persistent TCP connection per network scanner.
//!
//! ```text
//! disconnected ──connect──▶ connecting ──▶ connected
//!      ▲                        │              │
//!      │                     error        FIN / read error / sweep
//!      └────── reconnect timer ◀───────────────┘
//!
//! any ──disconnect()──▶ disconnecting (no automatic reconnect)
//! ```
//!
//! Each connect attempt gets a fresh generation number. Readers and timers
//! carry the generation they were started for, so a stale reader can never
//! tear down a newer connection.

use super::framing::LineFramer;
use super::{LinkError, LinkSettings, LinkStatus, ScannerEvent, parse_connection_string};
use crate::core::{BackgroundTasks, TaskKind};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use shared::models::ScannerConfig;
use socket2::{SockRef, TcpKeepalive};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Backoff before the next reconnect: `base × min(error_count + 1, 5)`
pub fn reconnect_delay(base: Duration, error_count: u32) -> Duration {
    base * error_count.saturating_add(1).min(5)
}

/// Status report for one scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSnapshot {
    pub status: LinkStatus,
    pub connected: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_count: u32,
    pub connection_string: Option<String>,
}

impl LinkSnapshot {
    fn not_managed() -> Self {
        Self {
            status: LinkStatus::NotManaged,
            connected: false,
            last_activity: None,
            last_error: None,
            error_count: 0,
            connection_string: None,
        }
    }
}

/// Result of a one-shot connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionTest {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

struct ReconnectRequest {
    scanner_id: String,
    delay: Duration,
    cancel: CancellationToken,
}

/// Runtime state of one scanner connection
struct Link {
    config: ScannerConfig,
    status: LinkStatus,
    generation: u64,
    last_activity: Option<DateTime<Utc>>,
    last_error: Option<String>,
    error_count: u32,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
    reader_cancel: Option<CancellationToken>,
    reconnect: Option<CancellationToken>,
}

impl Link {
    fn connecting(config: ScannerConfig, generation: u64, error_count: u32) -> Self {
        Self {
            config,
            status: LinkStatus::Connecting,
            generation,
            last_activity: Some(Utc::now()),
            last_error: None,
            error_count,
            writer: None,
            reader: None,
            reader_cancel: None,
            reconnect: None,
        }
    }

    /// Stop the reader and drop the socket
    fn close_socket(&mut self) {
        if let Some(cancel) = self.reader_cancel.take() {
            cancel.cancel();
        }
        self.reader = None;
        self.writer = None;
    }

    /// Close the socket and cancel any pending reconnect
    fn teardown(&mut self) {
        self.close_socket();
        if let Some(timer) = self.reconnect.take() {
            timer.cancel();
        }
    }

    /// First failing liveness signal of a connected link
    fn liveness_fault(&self) -> Option<&'static str> {
        if self.reader.as_ref().is_none_or(JoinHandle::is_finished) {
            return Some("Socket destroyed");
        }
        let Some(writer) = &self.writer else {
            return Some("Socket not writable");
        };
        if self.reader_cancel.as_ref().is_none_or(CancellationToken::is_cancelled) {
            return Some("Socket not readable");
        }
        if !matches!(AsRef::<TcpStream>::as_ref(writer).take_error(), Ok(None)) {
            return Some("Socket error");
        }
        if writer.peer_addr().is_err() {
            return Some("Socket not connected");
        }
        None
    }

    fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            status: self.status,
            connected: self.status == LinkStatus::Connected,
            last_activity: self.last_activity,
            last_error: self.last_error.clone(),
            error_count: self.error_count,
            connection_string: self.config.connection_string.clone(),
        }
    }
}

struct Inner {
    settings: LinkSettings,
    links: DashMap<String, Link>,
    events: mpsc::UnboundedSender<ScannerEvent>,
    reconnect_tx: mpsc::UnboundedSender<ReconnectRequest>,
    reconnect_rx: Mutex<Option<mpsc::UnboundedReceiver<ReconnectRequest>>>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

/// Persistent connections to network scanners
///
/// Cheap to clone; clones share the same link table.
#[derive(Clone)]
pub struct ScannerLinkManager {
    inner: Arc<Inner>,
}

impl ScannerLinkManager {
    /// Create a manager and the receiving end of its event channel
    pub fn new(settings: LinkSettings) -> (Self, mpsc::UnboundedReceiver<ScannerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();
        let manager = Self {
            inner: Arc::new(Inner {
                settings,
                links: DashMap::new(),
                events,
                reconnect_tx,
                reconnect_rx: Mutex::new(Some(reconnect_rx)),
                generation: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        };
        (manager, events_rx)
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.inner.settings
    }

    /// Register the health sweep and the reconnect supervisor.
    ///
    /// Reconnect requests made before this call are queued and served once
    /// the supervisor runs.
    pub fn start(&self, tasks: &mut BackgroundTasks) {
        let receiver = match self.inner.reconnect_rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(receiver) = receiver else {
            tracing::warn!("Scanner link manager already started");
            return;
        };

        let sweep = self.clone();
        let token = tasks.shutdown_token();
        tasks.spawn("scanner_health_sweep", TaskKind::Periodic, async move {
            sweep.run_health_sweep(token).await;
        });

        let supervisor = self.clone();
        let token = tasks.shutdown_token();
        tasks.spawn("scanner_reconnect", TaskKind::Worker, async move {
            supervisor.run_reconnect_supervisor(receiver, token).await;
        });
    }

    /// Connect a network scanner.
    ///
    /// Returns `Ok(true)` once connected (or if it already was), `Ok(false)`
    /// when the attempt failed; failures feed the reconnect state machine.
    /// Configuration problems are returned as [`LinkError`].
    pub async fn connect(&self, config: &ScannerConfig) -> Result<bool, LinkError> {
        if !config.is_network() {
            tracing::info!(scanner_id = %config.id, kind = %String::from(config.connection_type.clone()), "Scanner {} is not a network scanner", config.name);
            return Err(LinkError::NotNetwork(config.name.clone()));
        }
        let connection_string = config
            .connection_string
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LinkError::MissingConnectionString(config.name.clone()))?;
        let (host, port) = parse_connection_string(connection_string)?;

        let already_connected = self
            .inner
            .links
            .get(&config.id)
            .is_some_and(|link| link.status == LinkStatus::Connected);
        if already_connected {
            tracing::debug!(scanner_id = %config.id, "Scanner {} is already connected", config.name);
            return Ok(true);
        }

        // Replace any previous link, keeping its error count for backoff
        let error_count = self
            .inner
            .links
            .remove(&config.id)
            .map(|(_, mut link)| {
                link.teardown();
                link.error_count
            })
            .unwrap_or(0);
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.links.insert(
            config.id.clone(),
            Link::connecting(config.clone(), generation, error_count),
        );

        tracing::info!(scanner_id = %config.id, addr = %connection_string, "Connecting to scanner {}...", config.name);

        let attempt = TcpStream::connect((host.as_str(), port));
        match tokio::time::timeout(self.inner.settings.connect_timeout, attempt).await {
            Ok(Ok(stream)) => Ok(self.on_connected(config, generation, stream)),
            Ok(Err(e)) => {
                self.on_connect_failed(&config.id, generation, e.to_string());
                Ok(false)
            }
            Err(_) => {
                self.on_connect_failed(&config.id, generation, "Connection timeout".to_string());
                Ok(false)
            }
        }
    }

    fn on_connected(&self, config: &ScannerConfig, generation: u64, stream: TcpStream) -> bool {
        let keepalive = TcpKeepalive::new().with_time(self.inner.settings.keepalive);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            tracing::warn!(scanner_id = %config.id, error = %e, "Failed to enable TCP keepalive");
        }
        let (reader, writer) = stream.into_split();

        let Some(mut link) = self.inner.links.get_mut(&config.id) else {
            return false;
        };
        if link.generation != generation || link.status != LinkStatus::Connecting {
            tracing::debug!(scanner_id = %config.id, "Link changed while connecting, dropping connection");
            return false;
        }

        let cancel = self.inner.shutdown.child_token();
        link.status = LinkStatus::Connected;
        link.error_count = 0;
        link.last_error = None;
        link.last_activity = Some(Utc::now());
        link.writer = Some(writer);
        link.reader_cancel = Some(cancel.clone());

        tracing::info!(scanner_id = %config.id, "Connected to scanner {}", config.name);
        self.emit(ScannerEvent::Connected {
            scanner_id: config.id.clone(),
        });

        // The reader only touches the table after its first read completes
        link.reader = Some(tokio::spawn(self.clone().read_loop(
            config.id.clone(),
            config.name.clone(),
            generation,
            reader,
            cancel,
        )));
        true
    }

    fn on_connect_failed(&self, scanner_id: &str, generation: u64, message: String) {
        tracing::warn!(scanner_id = %scanner_id, error = %message, "Scanner connection failed");
        self.mark_error(scanner_id, generation, message);
        self.handle_disconnection(scanner_id, generation, None);
    }

    async fn read_loop(
        self,
        scanner_id: String,
        name: String,
        generation: u64,
        mut reader: OwnedReadHalf,
        cancel: CancellationToken,
    ) {
        let idle = self.inner.settings.idle_timeout;
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; 1024];

        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                read = tokio::time::timeout(idle, reader.read(&mut buf)) => read,
            };

            match read {
                Err(_) => {
                    // Liveness is decided by the health sweep
                    tracing::debug!(scanner_id = %scanner_id, "Scanner {} idle timeout", name);
                }
                Ok(Ok(0)) => {
                    tracing::info!(scanner_id = %scanner_id, "Scanner {} received FIN (remote closed connection)", name);
                    self.handle_disconnection(&scanner_id, generation, Some("Remote closed connection"));
                    break;
                }
                Ok(Ok(n)) => {
                    self.touch(&scanner_id, generation);
                    for line in framer.push(&buf[..n]) {
                        tracing::info!(scanner_id = %scanner_id, "Scanner {} received: {}", name, line);
                        self.emit(ScannerEvent::Data {
                            scanner_id: scanner_id.clone(),
                            line,
                        });
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(scanner_id = %scanner_id, error = %e, "Scanner {} read error", name);
                    self.mark_error(&scanner_id, generation, e.to_string());
                    self.handle_disconnection(&scanner_id, generation, None);
                    break;
                }
            }
        }
    }

    fn touch(&self, scanner_id: &str, generation: u64) {
        if let Some(mut link) = self.inner.links.get_mut(scanner_id)
            && link.generation == generation
        {
            link.last_activity = Some(Utc::now());
        }
    }

    /// Record an error: status `error`, error count +1
    fn mark_error(&self, scanner_id: &str, generation: u64, message: String) {
        {
            let Some(mut link) = self.inner.links.get_mut(scanner_id) else {
                return;
            };
            if link.generation != generation {
                return;
            }
            link.status = LinkStatus::Error;
            link.error_count += 1;
            link.last_error = Some(message.clone());
        }
        self.emit(ScannerEvent::Error {
            scanner_id: scanner_id.to_string(),
            message,
        });
    }

    /// Single entry point for every way a link can drop.
    ///
    /// Ignored for stale generations and for links already disconnected or
    /// being disconnected. A `reason` counts as an error.
    fn handle_disconnection(&self, scanner_id: &str, generation: u64, reason: Option<&str>) {
        {
            let Some(mut link) = self.inner.links.get_mut(scanner_id) else {
                return;
            };
            if link.generation != generation
                || matches!(link.status, LinkStatus::Disconnected | LinkStatus::Disconnecting)
            {
                return;
            }

            tracing::info!(
                scanner_id = %scanner_id,
                reason = reason.unwrap_or("connection error"),
                "Detected disconnection for scanner {}",
                link.config.name
            );
            link.close_socket();
            link.status = LinkStatus::Disconnected;
            if let Some(reason) = reason {
                link.error_count += 1;
                link.last_error = Some(reason.to_string());
            }
        }

        self.emit(ScannerEvent::Disconnected {
            scanner_id: scanner_id.to_string(),
        });
        self.schedule_reconnect(scanner_id);
    }

    fn schedule_reconnect(&self, scanner_id: &str) {
        let request = {
            let Some(mut link) = self.inner.links.get_mut(scanner_id) else {
                return;
            };
            if !link.config.enabled {
                tracing::info!(scanner_id = %scanner_id, "Scanner {} is disabled, not reconnecting", link.config.name);
                return;
            }
            if link.error_count >= self.inner.settings.max_errors {
                tracing::warn!(
                    scanner_id = %scanner_id,
                    error_count = link.error_count,
                    "Scanner {} exceeded max error count ({}), not reconnecting",
                    link.config.name,
                    self.inner.settings.max_errors
                );
                return;
            }
            if link.reconnect.is_some() {
                return;
            }

            let delay = reconnect_delay(self.inner.settings.reconnect_delay, link.error_count);
            let cancel = self.inner.shutdown.child_token();
            link.reconnect = Some(cancel.clone());
            tracing::info!(
                scanner_id = %scanner_id,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect for scanner {}",
                link.config.name
            );
            ReconnectRequest {
                scanner_id: scanner_id.to_string(),
                delay,
                cancel,
            }
        };

        if self.inner.reconnect_tx.send(request).is_err() {
            tracing::debug!(scanner_id = %scanner_id, "Reconnect supervisor gone, dropping request");
        }
    }

    async fn run_reconnect_supervisor(
        self,
        mut requests: mpsc::UnboundedReceiver<ReconnectRequest>,
        shutdown: CancellationToken,
    ) {
        let mut timers = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.inner.shutdown.cancelled() => break,
                request = requests.recv() => {
                    let Some(request) = request else { break };
                    let manager = self.clone();
                    timers.spawn(async move { manager.run_reconnect_timer(request).await });
                }
                Some(_) = timers.join_next(), if !timers.is_empty() => {}
            }
        }

        timers.shutdown().await;
        tracing::debug!("Scanner reconnect supervisor stopped");
    }

    async fn run_reconnect_timer(self, request: ReconnectRequest) {
        tokio::select! {
            _ = request.cancel.cancelled() => {
                tracing::debug!(scanner_id = %request.scanner_id, "Reconnect cancelled");
            }
            _ = tokio::time::sleep(request.delay) => {
                self.reconnect_due(&request.scanner_id, &request.cancel).await;
            }
        }
    }

    async fn reconnect_due(&self, scanner_id: &str, cancel: &CancellationToken) {
        let config = {
            let Some(mut link) = self.inner.links.get_mut(scanner_id) else {
                return;
            };
            if cancel.is_cancelled() {
                return;
            }
            link.reconnect = None;
            if !link.config.enabled
                || matches!(link.status, LinkStatus::Connected | LinkStatus::Disconnecting)
            {
                return;
            }
            link.config.clone()
        };

        match self.connect(&config).await {
            Ok(true) => tracing::info!(scanner_id = %scanner_id, "Scanner {} reconnected", config.name),
            Ok(false) => {}
            Err(e) => tracing::warn!(scanner_id = %scanner_id, error = %e, "Reconnect aborted"),
        }
    }

    async fn run_health_sweep(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.inner.settings.health_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.inner.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }
        tracing::debug!("Scanner health sweep stopped");
    }

    /// Check every connected link and drop the ones failing a liveness
    /// signal. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let faulty: Vec<(String, u64, &'static str)> = self
            .inner
            .links
            .iter()
            .filter(|link| link.status == LinkStatus::Connected)
            .filter_map(|link| {
                link.liveness_fault()
                    .map(|reason| (link.key().clone(), link.generation, reason))
            })
            .collect();

        for (scanner_id, generation, reason) in &faulty {
            tracing::warn!(scanner_id = %scanner_id, reason = %reason, "Scanner link failed health check");
            self.handle_disconnection(scanner_id, *generation, Some(reason));
        }
        faulty.len()
    }

    /// Operator disconnect. The link stays in `disconnecting` and is not
    /// reconnected automatically. Returns false for unknown ids.
    pub fn disconnect(&self, scanner_id: &str) -> bool {
        let Some(mut link) = self.inner.links.get_mut(scanner_id) else {
            return false;
        };
        tracing::info!(scanner_id = %scanner_id, "Disconnecting from scanner {}...", link.config.name);
        link.status = LinkStatus::Disconnecting;
        link.teardown();
        true
    }

    /// Apply a changed scanner configuration
    pub async fn refresh(&self, config: &ScannerConfig) -> Result<(), LinkError> {
        let current = self
            .inner
            .links
            .get(&config.id)
            .map(|link| link.config.connection_string.clone());

        if !config.enabled || !config.is_network() {
            if current.is_some() {
                self.disconnect(&config.id);
            }
            return Ok(());
        }

        match current {
            Some(connection_string) if connection_string == config.connection_string => {
                let live = match self.inner.links.get_mut(&config.id) {
                    Some(mut link) => {
                        link.config = config.clone();
                        let live = matches!(link.status, LinkStatus::Connected | LinkStatus::Connecting);
                        if !live {
                            // Operator action: start backoff from scratch
                            link.error_count = 0;
                        }
                        live
                    }
                    None => false,
                };
                if live {
                    return Ok(());
                }
                self.connect(config).await.map(|_| ())
            }
            Some(_) => {
                self.disconnect(&config.id);
                self.connect(config).await.map(|_| ())
            }
            None => self.connect(config).await.map(|_| ()),
        }
    }

    /// One-shot connect/close check outside the managed pool
    pub async fn test_connection(&self, config: &ScannerConfig) -> ConnectionTest {
        let Some(connection_string) = config
            .connection_string
            .as_deref()
            .filter(|s| config.is_network() && !s.is_empty())
        else {
            return ConnectionTest::failed("Not a network scanner or no connection string");
        };
        let (host, port) = match parse_connection_string(connection_string) {
            Ok(parts) => parts,
            Err(LinkError::InvalidPort(_)) => return ConnectionTest::failed("Invalid port number"),
            Err(_) => {
                return ConnectionTest::failed("Invalid connection string format (expected host:port)");
            }
        };

        let limit = self.inner.settings.test_timeout;
        match tokio::time::timeout(limit, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                ConnectionTest::ok(format!("Successfully connected to {}:{}", host, port))
            }
            Ok(Err(e)) => ConnectionTest::failed(e.to_string()),
            Err(_) => ConnectionTest::failed(format!("Connection timeout ({}s)", limit.as_secs())),
        }
    }

    /// Connect every enabled network scanner, one after another.
    /// Returns how many were attempted.
    pub async fn initialize_all(&self, configs: &[ScannerConfig]) -> usize {
        tracing::info!("Initializing {} scanner(s)...", configs.len());
        let managed: Vec<&ScannerConfig> = configs.iter().filter(|c| c.is_managed()).collect();
        tracing::info!("Found {} enabled network scanner(s)", managed.len());

        for config in &managed {
            if let Err(e) = self.connect(config).await {
                tracing::warn!(scanner_id = %config.id, error = %e, "Scanner not connected");
            }
        }
        managed.len()
    }

    pub fn status(&self) -> HashMap<String, LinkSnapshot> {
        self.inner
            .links
            .iter()
            .map(|link| (link.key().clone(), link.snapshot()))
            .collect()
    }

    pub fn scanner_status(&self, scanner_id: &str) -> LinkSnapshot {
        self.inner
            .links
            .get(scanner_id)
            .map(|link| link.snapshot())
            .unwrap_or_else(LinkSnapshot::not_managed)
    }

    pub fn is_connected(&self, scanner_id: &str) -> bool {
        self.scanner_status(scanner_id).connected
    }

    /// Whether a reconnect timer is pending for the scanner
    pub fn reconnect_pending(&self, scanner_id: &str) -> bool {
        self.inner
            .links
            .get(scanner_id)
            .is_some_and(|link| link.reconnect.is_some())
    }

    /// Stop the sweep and supervisor and drop every link
    pub fn shutdown(&self) {
        tracing::info!("Shutting down scanner link manager...");
        self.inner.shutdown.cancel();

        let ids: Vec<String> = self.inner.links.iter().map(|link| link.key().clone()).collect();
        for id in &ids {
            self.disconnect(id);
        }
        self.inner.links.clear();
    }

    fn emit(&self, event: ScannerEvent) {
        if self.inner.events.send(event).is_err() {
            tracing::debug!("Scanner event receiver dropped");
        }
    }
}
