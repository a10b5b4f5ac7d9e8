//! Printer service - ad hoc printer operations through the registry

use super::registry::{PrinterRegistry, new_printer_id};
use crate::utils::{AppError, AppResult};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use shared::models::{PrinterCreate, PrinterRecord, PrinterStatus, PrinterUpdate};
use std::sync::{Arc, LazyLock};
use zpl_printer::{ExtendedStatus, PeelSensorReading, PrinterClient, ProbeStatus};

static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("valid address pattern"));

fn validate_ip(ip: &str) -> AppResult<()> {
    if ip.is_empty() {
        return Err(AppError::validation("IP address is required"));
    }
    if !IPV4.is_match(ip) {
        return Err(AppError::validation("Invalid IP address format"));
    }
    Ok(())
}

/// Per-printer result of a bulk print
#[derive(Debug, Clone, Serialize)]
pub struct BulkPrintResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct PrinterService {
    registry: Arc<PrinterRegistry>,
    client: Arc<dyn PrinterClient>,
}

impl PrinterService {
    pub fn new(registry: Arc<PrinterRegistry>, client: Arc<dyn PrinterClient>) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &Arc<PrinterRegistry> {
        &self.registry
    }

    pub fn list(&self) -> Vec<PrinterRecord> {
        self.registry.list()
    }

    pub fn get(&self, id: &str) -> AppResult<PrinterRecord> {
        self.registry
            .get(id)
            .ok_or_else(|| AppError::not_found(format!("Printer {}", id)))
    }

    /// Register a printer. The printer is probed once to seed its status.
    pub async fn add_printer(&self, data: PrinterCreate) -> AppResult<PrinterRecord> {
        let ip = data.ip.trim().to_string();
        validate_ip(&ip)?;

        let driver = data.driver.unwrap_or_default();
        let probe = self.client.probe(&ip, driver).await;
        let now = Utc::now();

        let id = new_printer_id();
        let record = PrinterRecord {
            id: id.clone(),
            name: data
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("ZT411-{}", ip)),
            description: data.description.unwrap_or_default(),
            ip,
            driver,
            status: PrinterStatus::from_online(probe.online),
            added_at: Some(now),
            last_checked: Some(now),
            ..Default::default()
        };

        self.registry.set(&id, record.clone());
        self.registry.persist().await?;
        tracing::info!(printer_id = %id, ip = %record.ip, status = ?record.status, "Printer added");
        Ok(record)
    }

    pub async fn update_printer(&self, id: &str, data: PrinterUpdate) -> AppResult<PrinterRecord> {
        if let Some(ip) = data.ip.as_deref().filter(|ip| !ip.is_empty()) {
            validate_ip(ip)?;
        }

        let record = self
            .registry
            .update(id, |p| {
                if let Some(ip) = data.ip.filter(|ip| !ip.is_empty()) {
                    p.ip = ip;
                }
                if let Some(name) = data.name.filter(|n| !n.is_empty()) {
                    p.name = name;
                }
                if let Some(description) = data.description {
                    p.description = description;
                }
                if let Some(driver) = data.driver {
                    p.driver = driver;
                }
                p.updated_at = Some(Utc::now());
            })
            .ok_or_else(|| AppError::not_found(format!("Printer {}", id)))?;

        self.registry.persist().await?;
        Ok(record)
    }

    pub async fn remove_printer(&self, id: &str) -> AppResult<PrinterRecord> {
        let record = self
            .registry
            .delete(id)
            .ok_or_else(|| AppError::not_found(format!("Printer {}", id)))?;
        self.registry.persist().await?;
        tracing::info!(printer_id = %id, "Printer removed");
        Ok(record)
    }

    /// Send a print job to one printer.
    ///
    /// The outcome is recorded on the printer (online + last print, or
    /// offline) and persisted either way.
    pub async fn print(&self, id: &str, payload: &str) -> AppResult<PrinterRecord> {
        let printer = self.get(id)?;
        if payload.is_empty() {
            return Err(AppError::validation("ZPL data is required"));
        }

        let result = self.client.send(&printer.ip, printer.driver, payload).await;
        let updated = self.registry.update(id, |p| match &result {
            Ok(_) => {
                p.status = PrinterStatus::Online;
                p.last_print = Some(Utc::now());
            }
            Err(_) => p.status = PrinterStatus::Offline,
        });
        self.registry.persist_or_log().await;

        match result {
            Ok(_) => Ok(updated.unwrap_or(printer)),
            Err(e) => {
                tracing::warn!(printer_id = %id, ip = %printer.ip, error = %e, "Print failed");
                Err(e.into())
            }
        }
    }

    /// Send the same job to several printers, one after another
    pub async fn print_bulk(&self, ids: &[String], payload: &str) -> AppResult<Vec<BulkPrintResult>> {
        if ids.is_empty() {
            return Err(AppError::validation("Array of printer IDs is required"));
        }
        if payload.is_empty() {
            return Err(AppError::validation("ZPL data is required"));
        }

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(printer) = self.registry.get(id) else {
                results.push(BulkPrintResult {
                    id: id.clone(),
                    success: false,
                    printer: None,
                    error: Some("Printer not found".into()),
                });
                continue;
            };

            match self.client.send(&printer.ip, printer.driver, payload).await {
                Ok(_) => {
                    self.registry.update(id, |p| {
                        p.status = PrinterStatus::Online;
                        p.last_print = Some(Utc::now());
                    });
                    results.push(BulkPrintResult {
                        id: id.clone(),
                        success: true,
                        printer: Some(printer.name),
                        error: None,
                    });
                }
                Err(e) => {
                    self.registry.update(id, |p| p.status = PrinterStatus::Offline);
                    results.push(BulkPrintResult {
                        id: id.clone(),
                        success: false,
                        printer: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        self.registry.persist_or_log().await;
        let sent = results.iter().filter(|r| r.success).count();
        tracing::info!("Print jobs sent to {}/{} printers", sent, ids.len());
        Ok(results)
    }

    /// Probe a printer and record the result
    pub async fn check_status(&self, id: &str) -> AppResult<ProbeStatus> {
        let printer = self.get(id)?;
        let status = self.client.probe(&printer.ip, printer.driver).await;

        self.registry.update(id, |p| {
            p.status = PrinterStatus::from_online(status.online);
            p.last_checked = Some(Utc::now());
        });
        self.registry.persist_or_log().await;
        Ok(status)
    }

    pub async fn peel_sensor(&self, id: &str) -> AppResult<PeelSensorReading> {
        let printer = self.get(id)?;
        Ok(self.client.peel_sensor(&printer.ip, printer.driver).await?)
    }

    pub async fn extended_status(&self, id: &str) -> AppResult<ExtendedStatus> {
        let printer = self.get(id)?;
        Ok(self.client.extended_status(&printer.ip, printer.driver).await?)
    }
}
