//! Scan dispatcher
//!
//! Consumes scanner link events. Each data line is routed on its own task so
//! a slow printer on one scan does not hold up the next.

use super::router::{ScanOutcome, ScanEventRouter};
use crate::scanners::ScannerEvent;
use shared::models::PrintResultStatus;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Run until shutdown or until the event channel closes.
///
/// Scans still in flight at shutdown are awaited before returning.
pub async fn run(
    router: Arc<ScanEventRouter>,
    mut events: mpsc::UnboundedReceiver<ScannerEvent>,
    shutdown: CancellationToken,
) {
    tracing::info!("Scan dispatcher started");
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Scan dispatcher received shutdown signal");
                break;
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Scanner event channel closed, dispatcher stopping");
                    break;
                };
                match event {
                    ScannerEvent::Data { scanner_id, line } => {
                        let router = router.clone();
                        in_flight.spawn(async move {
                            let outcome = router.handle(&scanner_id, &line).await;
                            log_outcome(&scanner_id, &outcome);
                        });
                    }
                    ScannerEvent::Connected { scanner_id } => {
                        tracing::info!(scanner_id = %scanner_id, "Scanner connected");
                    }
                    ScannerEvent::Disconnected { scanner_id } => {
                        tracing::info!(scanner_id = %scanner_id, "Scanner disconnected");
                    }
                    ScannerEvent::Error { scanner_id, message } => {
                        tracing::warn!(scanner_id = %scanner_id, error = %message, "Scanner error");
                    }
                }
            }
        }
    }

    while in_flight.join_next().await.is_some() {}
    tracing::info!("Scan dispatcher stopped");
}

fn log_outcome(scanner_id: &str, outcome: &ScanOutcome) {
    if outcome.is_unparsed() {
        return;
    }
    if !outcome.success {
        tracing::error!(
            scanner_id = %scanner_id,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            "Scan processing failed"
        );
        return;
    }

    let code = outcome.code.as_deref().unwrap_or_default();
    tracing::info!(
        scanner_id = %scanner_id,
        code = %code,
        status = ?outcome.status,
        "Printed {} label(s)",
        outcome.labels_printed
    );
    for result in &outcome.results {
        match result.status {
            PrintResultStatus::Success => tracing::info!(
                group = %result.group,
                printer_id = result.printer.as_deref().unwrap_or_default(),
                copies = result.copies.unwrap_or_default(),
                "Configuration printed"
            ),
            PrintResultStatus::Error => tracing::warn!(
                group = %result.group,
                reason = result.reason.as_deref().unwrap_or_default(),
                "Configuration failed"
            ),
            PrintResultStatus::Skipped => tracing::info!(
                group = %result.group,
                reason = result.reason.as_deref().unwrap_or_default(),
                "Configuration skipped"
            ),
        }
    }
}
