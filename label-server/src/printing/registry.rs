//! JSON-file printer registry
//!
//! The file is a map keyed by printer id:
//!
//! ```json
//! { "printer_1736935200000": { "ip": "10.0.0.5", "name": "ZT411-10.0.0.5", ... } }
//! ```
//!
//! Records live in memory; `persist()` writes the whole map back. Saves are
//! serialized, and each one writes the table as it stands when its turn
//! comes, so the file never lags behind the last completed save.

use dashmap::DashMap;
use shared::models::PrinterRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Printer file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Printer file serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// New printer id: `printer_<unix millis>`
pub fn new_printer_id() -> String {
    format!("printer_{}", shared::util::now_millis())
}

/// Process-wide printer table
#[derive(Debug)]
pub struct PrinterRegistry {
    path: PathBuf,
    printers: DashMap<String, PrinterRecord>,
    save_lock: Mutex<()>,
}

impl PrinterRegistry {
    /// Empty registry backed by `path` (nothing is read)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            printers: DashMap::new(),
            save_lock: Mutex::new(()),
        }
    }

    /// Load the registry from disk.
    ///
    /// A missing file gives an empty registry. So does an unreadable or
    /// corrupt one, after logging the error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let registry = Self::new(path);
        match registry.read_file() {
            Ok(Some(records)) => {
                for (id, mut record) in records {
                    record.id = id.clone();
                    registry.printers.insert(id, record);
                }
                tracing::info!(
                    path = %registry.path.display(),
                    "Loaded {} printers from storage",
                    registry.printers.len()
                );
            }
            Ok(None) => {
                tracing::debug!(path = %registry.path.display(), "No printer file yet");
            }
            Err(e) => {
                tracing::error!(path = %registry.path.display(), error = %e, "Error loading printers");
            }
        }
        registry
    }

    fn read_file(&self) -> RegistryResult<Option<BTreeMap<String, PrinterRecord>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All printers, ordered by id
    pub fn list(&self) -> Vec<PrinterRecord> {
        let mut printers: Vec<PrinterRecord> =
            self.printers.iter().map(|entry| entry.value().clone()).collect();
        printers.sort_by(|a, b| a.id.cmp(&b.id));
        printers
    }

    pub fn get(&self, id: &str) -> Option<PrinterRecord> {
        self.printers.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.printers.contains_key(id)
    }

    /// Insert or replace a printer
    pub fn set(&self, id: &str, mut record: PrinterRecord) {
        record.id = id.to_string();
        self.printers.insert(id.to_string(), record);
    }

    /// Mutate a printer in place; returns the updated record
    pub fn update<F>(&self, id: &str, f: F) -> Option<PrinterRecord>
    where
        F: FnOnce(&mut PrinterRecord),
    {
        let mut entry = self.printers.get_mut(id)?;
        f(entry.value_mut());
        Some(entry.value().clone())
    }

    pub fn delete(&self, id: &str) -> Option<PrinterRecord> {
        self.printers.remove(id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }

    /// Write the whole table back to disk
    pub async fn persist(&self) -> RegistryResult<()> {
        let _guard = self.save_lock.lock().await;

        let snapshot: BTreeMap<String, PrinterRecord> = self
            .printers
            .iter()
            .map(|entry| {
                let mut record = entry.value().clone();
                record.id.clear();
                (entry.key().clone(), record)
            })
            .collect();

        let json = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), "Saved {} printers", snapshot.len());
        Ok(())
    }

    /// Persist, logging instead of returning the error
    pub async fn persist_or_log(&self) {
        if let Err(e) = self.persist().await {
            tracing::error!(path = %self.path.display(), error = %e, "Error saving printers");
        }
    }
}
