//! Scan event router
//!
//! One scanned code fans out to every matching print configuration. Each
//! configuration is compiled and sent on its own; a failure on one printer
//! never stops the others. The aggregate is logged as one [`ScanEvent`].

use super::provider::{ConfigResolver, ScanEventSink};
use crate::printing::{PrinterRegistry, RenderContext, compile};
use crate::scanners::parse_scan_line;
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use shared::models::{
    DEFAULT_CODE, PrintConfiguration, PrintJobResult, PrintResultStatus, ScanEvent, ScanStatus,
};
use std::sync::Arc;
use zpl_printer::PrinterClient;

/// Result of handling one scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ScanStatus>,
    pub labels_printed: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<PrintJobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanOutcome {
    fn failed(code: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            status: None,
            labels_printed: 0,
            results: Vec::new(),
            event_id: None,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Raw line without a recognizable code; nothing was printed or logged
    fn unparsed() -> Self {
        Self {
            success: false,
            code: None,
            status: None,
            labels_printed: 0,
            results: Vec::new(),
            event_id: None,
            message: Some("Could not parse scan data, expected star;...stop;".into()),
            error: None,
        }
    }

    /// Whether the line carried a code at all
    pub fn is_unparsed(&self) -> bool {
        self.code.is_none() && self.error.is_none()
    }
}

/// Turns scanned codes into printed labels
pub struct ScanEventRouter {
    resolver: Arc<dyn ConfigResolver>,
    sink: Arc<dyn ScanEventSink>,
    registry: Arc<PrinterRegistry>,
    client: Arc<dyn PrinterClient>,
}

impl ScanEventRouter {
    pub fn new(
        resolver: Arc<dyn ConfigResolver>,
        sink: Arc<dyn ScanEventSink>,
        registry: Arc<PrinterRegistry>,
        client: Arc<dyn PrinterClient>,
    ) -> Self {
        Self {
            resolver,
            sink,
            registry,
            client,
        }
    }

    /// Handle a raw scanner line
    pub async fn handle(&self, scanner_id: &str, raw_line: &str) -> ScanOutcome {
        match parse_scan_line(raw_line) {
            Some(code) => self.process(scanner_id, &code).await,
            None => {
                tracing::info!(scanner_id = %scanner_id, raw = %raw_line, "Could not parse scan data");
                ScanOutcome::unparsed()
            }
        }
    }

    /// Print every configuration matching an already parsed code
    pub async fn process(&self, scanner_id: &str, code: &str) -> ScanOutcome {
        if scanner_id.is_empty() || code.is_empty() {
            return ScanOutcome::failed(
                Some(code.to_string()),
                "scanner_id and license_plate_code are required",
            );
        }

        let configs = match self.resolve(scanner_id, code).await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!(scanner_id = %scanner_id, code = %code, error = %e, "Configuration lookup failed");
                return ScanOutcome::failed(Some(code.to_string()), e.to_string());
            }
        };

        let event_id = shared::util::new_uuid();
        let today = Local::now().date_naive();

        if configs.is_empty() {
            self.log_event(&event_id, scanner_id, code, ScanStatus::NoConfig, 0)
                .await;
            return ScanOutcome {
                success: true,
                code: Some(code.to_string()),
                status: Some(ScanStatus::NoConfig),
                labels_printed: 0,
                results: Vec::new(),
                event_id: Some(event_id),
                message: Some("No print configurations found for this code".into()),
                error: None,
            };
        }

        let mut results = Vec::with_capacity(configs.len());
        let mut printed = 0;
        for config in configs {
            let result = self.print_configuration(config, today).await;
            if result.status == PrintResultStatus::Success {
                printed += result.copies.unwrap_or(0);
            }
            results.push(result);
        }

        let status = if results.iter().any(|r| r.status == PrintResultStatus::Error) {
            ScanStatus::Partial
        } else {
            ScanStatus::Success
        };
        self.log_event(&event_id, scanner_id, code, status, printed)
            .await;

        ScanOutcome {
            success: true,
            code: Some(code.to_string()),
            status: Some(status),
            labels_printed: printed,
            results,
            event_id: Some(event_id),
            message: None,
            error: None,
        }
    }

    /// Exact code first, then the `DEFAULT` code
    async fn resolve(&self, scanner_id: &str, code: &str) -> crate::utils::AppResult<Vec<PrintConfiguration>> {
        let configs = self.resolver.resolve(scanner_id, code).await?;
        if configs.is_empty() && code != DEFAULT_CODE {
            tracing::debug!(scanner_id = %scanner_id, code = %code, "No exact match, trying DEFAULT");
            return self.resolver.resolve(scanner_id, DEFAULT_CODE).await;
        }
        Ok(configs)
    }

    async fn print_configuration(&self, config: PrintConfiguration, today: NaiveDate) -> PrintJobResult {
        let group = config.display_name().to_string();

        let Some(printer_id) = config.printer_id.clone().filter(|id| !id.is_empty()) else {
            return PrintJobResult::skipped(group, "No printer assigned");
        };
        let Some(elements) = config.elements.clone() else {
            return PrintJobResult::skipped(group, "No template configured");
        };

        let mut ctx = RenderContext::from_config(&config, today);
        if ctx.pack_date.as_deref().is_none_or(str::is_empty) {
            ctx.pack_date = Some(today.format("%m/%d/%y").to_string());
        }

        let copies = config.effective_copies();
        let (width, height) = (config.label_width, config.label_height);
        // Image elements decode and resize bitmaps
        let zpl = match tokio::task::spawn_blocking(move || {
            compile(&elements, width, height, copies, &ctx)
        })
        .await
        {
            Ok(zpl) => zpl,
            Err(e) => {
                tracing::error!(group = %group, error = %e, "Label compilation failed");
                return PrintJobResult::error(group, "Label compilation failed");
            }
        };

        let Some(printer) = self.registry.get(&printer_id) else {
            return PrintJobResult::error(group, format!("Printer {} not found", printer_id));
        };

        match self.client.send(&printer.ip, printer.driver, &zpl).await {
            Ok(_) => {
                tracing::info!(group = %group, printer_id = %printer_id, copies, "Label sent");
                PrintJobResult::success(group, printer_id, copies)
            }
            Err(e) => {
                tracing::warn!(group = %group, printer_id = %printer_id, error = %e, "Label print failed");
                PrintJobResult::error(group, e.to_string())
            }
        }
    }

    async fn log_event(
        &self,
        event_id: &str,
        scanner_id: &str,
        code: &str,
        status: ScanStatus,
        labels_printed: u32,
    ) {
        let event = ScanEvent {
            id: event_id.to_string(),
            scanner_id: scanner_id.to_string(),
            license_plate_code: code.to_string(),
            status,
            labels_printed,
            created_at: Utc::now(),
        };
        if let Err(e) = self.sink.record(&event).await {
            tracing::error!(event_id = %event_id, error = %e, "Failed to record scan event");
        }
    }
}
