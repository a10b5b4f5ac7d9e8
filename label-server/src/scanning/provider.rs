//! Scan collaborators
//!
//! [`ConfigResolver`] supplies print configurations for a scanner and code;
//! [`ScanEventSink`] receives the completed scan event. The file-backed
//! implementations here serve standalone deployments.

use crate::utils::AppResult;
use async_trait::async_trait;
use shared::models::{PrintConfiguration, ScanEvent, ScannerConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Print configurations for a scanner and code, in print order
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    async fn resolve(&self, scanner_id: &str, code: &str) -> AppResult<Vec<PrintConfiguration>>;
}

/// Destination of completed scan events
#[async_trait]
pub trait ScanEventSink: Send + Sync {
    async fn record(&self, event: &ScanEvent) -> AppResult<()>;
}

type ConfigTable = HashMap<String, HashMap<String, Vec<PrintConfiguration>>>;

/// Print configurations read from a JSON file:
///
/// ```json
/// { "<scanner id>": { "A-01": [ { "group_name": "Line 1", ... } ], "DEFAULT": [ ... ] } }
/// ```
#[derive(Debug, Default)]
pub struct JsonScanConfigSource {
    table: ConfigTable,
}

impl JsonScanConfigSource {
    /// Load the table; a missing file is an empty table
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "No scan configuration file, every scan will be no_config");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let table: ConfigTable = serde_json::from_str(&data)?;
        tracing::info!(
            path = %path.display(),
            scanners = table.len(),
            "Loaded scan configurations"
        );
        Ok(Self { table })
    }

    /// Add configurations for a scanner and code
    pub fn insert(&mut self, scanner_id: &str, code: &str, configs: Vec<PrintConfiguration>) {
        self.table
            .entry(scanner_id.to_string())
            .or_default()
            .insert(code.to_string(), configs);
    }
}

#[async_trait]
impl ConfigResolver for JsonScanConfigSource {
    async fn resolve(&self, scanner_id: &str, code: &str) -> AppResult<Vec<PrintConfiguration>> {
        Ok(self
            .table
            .get(scanner_id)
            .and_then(|codes| codes.get(code))
            .cloned()
            .unwrap_or_default())
    }
}

/// Scanner configurations from a JSON array file; missing file is empty
pub fn load_scanners(path: &Path) -> AppResult<Vec<ScannerConfig>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No scanner file");
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Appends each event as one JSON line
pub struct JsonlEventSink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlEventSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl ScanEventSink for JsonlEventSink {
    async fn record(&self, event: &ScanEvent) -> AppResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: std::sync::Mutex<Vec<ScanEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ScanEventSink for MemoryEventSink {
    async fn record(&self, event: &ScanEvent) -> AppResult<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}
