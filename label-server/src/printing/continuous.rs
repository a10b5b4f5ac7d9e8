//! Continuous print
//!
//! Keeps a two-label queue on a peel-mode printer: one label presented, one
//! buffered. The controller fills the queue, then polls the peel sensor and
//! sends one replacement for every label taken.
//!
//! The tracked queue depth is an estimate built from sensor transitions only.
//! A missed or failed sensor read lets it drift from what is physically on
//! the printer; the printed count stays exact.

use super::registry::PrinterRegistry;
use crate::utils::{AppError, AppResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use shared::models::{ContinuousPrintState, PrinterRecord, PrinterStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use zpl_printer::PrinterClient;

/// Labels kept on the printer: one presented, one buffered
pub const QUEUE_TARGET: u32 = 2;
const FILL_DELAY: Duration = Duration::from_millis(100);
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Reply to a successful start
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousStart {
    pub printer: String,
    pub ip: String,
    pub job_id: String,
    pub poll_interval: u64,
    pub queue_size: u32,
    pub started_at: DateTime<Utc>,
}

/// Continuous state of one printer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousStatus {
    pub printer: String,
    pub active: bool,
    pub labels_printed: u64,
    pub waiting_for_peel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl ContinuousStatus {
    fn of(printer: &PrinterRecord) -> Self {
        match &printer.continuous_print {
            Some(state) => Self {
                printer: printer.name.clone(),
                active: state.active,
                labels_printed: state.count,
                waiting_for_peel: state.waiting_for_peel,
                poll_interval: Some(state.poll_interval),
                started_at: Some(state.started_at),
            },
            None => Self {
                printer: printer.name.clone(),
                active: false,
                labels_printed: 0,
                waiting_for_peel: false,
                poll_interval: None,
                started_at: None,
            },
        }
    }
}

struct JobHandle {
    job_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    registry: Arc<PrinterRegistry>,
    client: Arc<dyn PrinterClient>,
    jobs: DashMap<String, JobHandle>,
    default_poll: Duration,
    shutdown: CancellationToken,
}

/// Starts, stops and tracks continuous jobs, one per printer
#[derive(Clone)]
pub struct ContinuousPrintManager {
    inner: Arc<Inner>,
}

impl ContinuousPrintManager {
    pub fn new(
        registry: Arc<PrinterRegistry>,
        client: Arc<dyn PrinterClient>,
        default_poll: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                client,
                jobs: DashMap::new(),
                default_poll,
                shutdown,
            }),
        }
    }

    /// Start (or restart) continuous printing of `payload` on a printer.
    ///
    /// Any previous job on the printer is replaced and its loop exits.
    pub async fn start(
        &self,
        printer_id: &str,
        payload: &str,
        poll_interval: Option<Duration>,
    ) -> AppResult<ContinuousStart> {
        if payload.trim().is_empty() {
            return Err(AppError::validation("ZPL data is required"));
        }
        let poll = poll_interval
            .filter(|d| !d.is_zero())
            .unwrap_or(self.inner.default_poll);

        let job_id = shared::util::new_uuid();
        let started_at = Utc::now();
        let state = ContinuousPrintState {
            active: true,
            job_id: job_id.clone(),
            zpl: payload.to_string(),
            poll_interval: poll.as_millis() as u64,
            count: 0,
            waiting_for_peel: false,
            started_at,
        };

        let printer = self
            .inner
            .registry
            .update(printer_id, |p| p.continuous_print = Some(state))
            .ok_or_else(|| AppError::not_found(format!("Printer {}", printer_id)))?;
        self.inner.registry.persist_or_log().await;

        let cancel = self.inner.shutdown.child_token();
        let controller = Controller {
            inner: self.inner.clone(),
            printer_id: printer_id.to_string(),
            job_id: job_id.clone(),
            payload: payload.to_string(),
            poll,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(controller.run());

        let previous = self.inner.jobs.insert(
            printer_id.to_string(),
            JobHandle {
                job_id: job_id.clone(),
                cancel,
                handle,
            },
        );
        if let Some(previous) = previous {
            tracing::info!(printer_id = %printer_id, job_id = %previous.job_id, "Replacing continuous print job");
            previous.cancel.cancel();
        }

        Ok(ContinuousStart {
            printer: printer.name,
            ip: printer.ip,
            job_id,
            poll_interval: poll.as_millis() as u64,
            queue_size: QUEUE_TARGET,
            started_at,
        })
    }

    /// Stop the printer's job.
    ///
    /// Returns the labels printed, or `None` when no job was active.
    pub async fn stop(&self, printer_id: &str) -> AppResult<Option<u64>> {
        let printer = self
            .inner
            .registry
            .get(printer_id)
            .ok_or_else(|| AppError::not_found(format!("Printer {}", printer_id)))?;

        if !printer.is_continuous_active() {
            return Ok(None);
        }

        let mut printed = 0;
        self.inner.registry.update(printer_id, |p| {
            if let Some(state) = p.continuous_print.as_mut() {
                state.active = false;
                state.waiting_for_peel = false;
                printed = state.count;
            }
        });
        self.inner.registry.persist_or_log().await;

        if let Some(job) = self.inner.jobs.get(printer_id) {
            job.cancel.cancel();
        }

        tracing::info!(printer_id = %printer_id, labels = printed, "Continuous printing stopped");
        Ok(Some(printed))
    }

    pub fn status(&self, printer_id: &str) -> AppResult<ContinuousStatus> {
        self.inner
            .registry
            .get(printer_id)
            .map(|p| ContinuousStatus::of(&p))
            .ok_or_else(|| AppError::not_found(format!("Printer {}", printer_id)))
    }

    /// Whether a controller loop is running for the printer
    pub fn is_running(&self, printer_id: &str) -> bool {
        self.inner
            .jobs
            .get(printer_id)
            .is_some_and(|job| !job.handle.is_finished())
    }

    pub fn active_jobs(&self) -> usize {
        self.inner
            .jobs
            .iter()
            .filter(|job| !job.handle.is_finished())
            .count()
    }

    /// Cancel every job and wait for the loops to exit
    pub async fn shutdown(&self, limit: Duration) {
        let ids: Vec<String> = self.inner.jobs.iter().map(|e| e.key().clone()).collect();
        let jobs: Vec<(String, JobHandle)> = ids
            .into_iter()
            .filter_map(|id| self.inner.jobs.remove(&id))
            .collect();
        if jobs.is_empty() {
            return;
        }

        tracing::info!("Stopping {} continuous print jobs", jobs.len());
        let deadline = tokio::time::Instant::now() + limit;
        for (printer_id, job) in jobs {
            job.cancel.cancel();
            let abort = job.handle.abort_handle();
            if tokio::time::timeout_at(deadline, job.handle).await.is_err() {
                tracing::warn!(printer_id = %printer_id, "Continuous print loop did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}

/// One job's control loop
struct Controller {
    inner: Arc<Inner>,
    printer_id: String,
    job_id: String,
    payload: String,
    poll: Duration,
    cancel: CancellationToken,
}

impl Controller {
    /// The printer record, while this job is still the active one
    fn current(&self) -> Option<PrinterRecord> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.inner.registry.get(&self.printer_id).filter(|p| {
            p.continuous_print
                .as_ref()
                .is_some_and(|c| c.active && c.job_id == self.job_id)
        })
    }

    /// Sleep unless cancelled first
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn update_state(&self, f: impl FnOnce(&mut PrinterRecord, &mut ContinuousPrintState)) {
        let job_id = &self.job_id;
        self.inner.registry.update(&self.printer_id, |p| {
            if let Some(mut state) = p.continuous_print.take() {
                if &state.job_id == job_id {
                    f(p, &mut state);
                }
                p.continuous_print = Some(state);
            }
        });
    }

    fn record_print(&self) -> u64 {
        let mut count = 0;
        self.update_state(|p, state| {
            state.count += 1;
            count = state.count;
            p.last_print = Some(Utc::now());
        });
        count
    }

    async fn run(self) {
        let Some(printer) = self.current() else {
            return;
        };
        let (ip, driver) = (printer.ip.clone(), printer.driver);
        tracing::info!(
            printer_id = %self.printer_id,
            printer = %printer.name,
            driver = %driver,
            poll_ms = self.poll.as_millis() as u64,
            "Starting continuous print"
        );

        let mut depth: u32 = 0;
        for _ in 0..QUEUE_TARGET {
            if self.current().is_none() {
                return self.finish().await;
            }
            match self.inner.client.send(&ip, driver, &self.payload).await {
                Ok(_) => {
                    depth += 1;
                    let count = self.record_print();
                    tracing::debug!(printer_id = %self.printer_id, count, queue_depth = depth, "Queued label");
                }
                Err(e) => {
                    tracing::error!(printer_id = %self.printer_id, error = %e, "Failed to queue initial label");
                }
            }
            if !self.pause(FILL_DELAY).await {
                return self.finish().await;
            }
        }

        self.update_state(|p, state| {
            p.status = PrinterStatus::Online;
            p.last_print = Some(Utc::now());
            state.waiting_for_peel = true;
        });
        self.inner.registry.persist_or_log().await;

        if !self.pause(SETTLE_DELAY).await {
            return self.finish().await;
        }

        while let Some(printer) = self.current() {
            let reading = match self.inner.client.peel_sensor(&printer.ip, printer.driver).await {
                Ok(reading) => reading,
                Err(e) => {
                    tracing::warn!(printer_id = %self.printer_id, error = %e, "Peel sensor check failed");
                    if !self.pause(self.poll).await {
                        break;
                    }
                    continue;
                }
            };

            let mut wait = self.poll;
            if reading.label_taken && depth > 0 {
                depth -= 1;
                tracing::debug!(printer_id = %self.printer_id, queue_depth = depth, "Label taken");

                if depth < QUEUE_TARGET {
                    match self.inner.client.send(&printer.ip, printer.driver, &self.payload).await {
                        Ok(_) => {
                            depth += 1;
                            let count = self.record_print();
                            tracing::debug!(printer_id = %self.printer_id, count, queue_depth = depth, "Queue replenished");
                        }
                        Err(e) => {
                            tracing::error!(printer_id = %self.printer_id, error = %e, "Continuous print error");
                            self.inner
                                .registry
                                .update(&self.printer_id, |p| p.status = PrinterStatus::Offline);
                            wait = self.poll * 2;
                        }
                    }
                }
            }

            if !self.pause(wait).await {
                break;
            }
        }

        self.finish().await;
    }

    async fn finish(&self) {
        let count = self
            .inner
            .registry
            .get(&self.printer_id)
            .and_then(|p| p.continuous_print)
            .filter(|c| c.job_id == self.job_id)
            .map(|c| c.count)
            .unwrap_or(0);
        tracing::info!(printer_id = %self.printer_id, job_id = %self.job_id, labels = count, "Continuous print loop exited");

        self.update_state(|_, state| state.waiting_for_peel = false);
        self.inner.registry.persist_or_log().await;
        self.inner
            .jobs
            .remove_if(&self.printer_id, |_, job| job.job_id == self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::testing::MockPrinter;
    use std::sync::atomic::Ordering;

    fn setup(mock: Arc<MockPrinter>) -> (ContinuousPrintManager, Arc<PrinterRegistry>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(PrinterRegistry::new(dir.path().join("printers.json")));
        registry.set(
            "printer_1",
            PrinterRecord {
                ip: "10.0.0.5".into(),
                name: "Packline".into(),
                ..Default::default()
            },
        );
        let manager = ContinuousPrintManager::new(
            registry.clone(),
            mock,
            Duration::from_millis(200),
            CancellationToken::new(),
        );
        (manager, registry, dir)
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_fill_then_replenish_once_per_taken_label() {
        let mock = Arc::new(MockPrinter::default());
        let (manager, registry, _dir) = setup(mock.clone());

        let started = manager
            .start("printer_1", "^XA^XZ", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(started.queue_size, 2);
        assert_eq!(started.poll_interval, 10);

        // Fill, then steady polling with nothing taken
        wait_for(|| mock.peel_queries.load(Ordering::SeqCst) >= 2).await;
        assert_eq!(mock.sends.load(Ordering::SeqCst), 2);
        assert_eq!(registry.get("printer_1").unwrap().status, PrinterStatus::Online);

        mock.push_label_taken();
        wait_for(|| mock.sends.load(Ordering::SeqCst) == 3).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mock.sends.load(Ordering::SeqCst), 3);

        let printed = manager.stop("printer_1").await.unwrap();
        assert_eq!(printed, Some(3));
        wait_for(|| !manager.is_running("printer_1")).await;

        let status = manager.status("printer_1").unwrap();
        assert!(!status.active);
        assert_eq!(status.labels_printed, 3);
    }

    #[tokio::test]
    async fn test_sensor_errors_keep_polling() {
        let mock = Arc::new(MockPrinter::default());
        mock.peel_fails.store(true, Ordering::SeqCst);
        let (manager, _registry, _dir) = setup(mock.clone());

        manager
            .start("printer_1", "^XA^XZ", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        wait_for(|| mock.peel_queries.load(Ordering::SeqCst) >= 3).await;
        assert!(manager.is_running("printer_1"));
        assert_eq!(mock.sends.load(Ordering::SeqCst), 2);

        manager.stop("printer_1").await.unwrap();
        wait_for(|| !manager.is_running("printer_1")).await;
    }

    #[tokio::test]
    async fn test_failed_fill_is_not_counted() {
        let mock = Arc::new(MockPrinter::default());
        mock.send_fails.store(true, Ordering::SeqCst);
        let (manager, _registry, _dir) = setup(mock.clone());

        manager
            .start("printer_1", "^XA^XZ", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        wait_for(|| mock.peel_queries.load(Ordering::SeqCst) >= 1).await;

        assert_eq!(manager.stop("printer_1").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_restart_replaces_previous_job() {
        let mock = Arc::new(MockPrinter::default());
        let (manager, registry, _dir) = setup(mock.clone());

        let first = manager.start("printer_1", "^XA^FDone^XZ", None).await.unwrap();
        let second = manager
            .start("printer_1", "^XA^FDtwo^XZ", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_ne!(first.job_id, second.job_id);

        let state = registry.get("printer_1").unwrap().continuous_print.unwrap();
        assert_eq!(state.job_id, second.job_id);
        assert_eq!(state.zpl, "^XA^FDtwo^XZ");
        assert_eq!(manager.active_jobs(), 1);

        manager.shutdown(Duration::from_secs(1)).await;
        assert_eq!(manager.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_job_and_unknown_printer() {
        let mock = Arc::new(MockPrinter::default());
        let (manager, _registry, _dir) = setup(mock);

        assert_eq!(manager.stop("printer_1").await.unwrap(), None);
        assert!(matches!(manager.stop("nope").await, Err(AppError::NotFound(_))));
        assert!(matches!(
            manager.start("nope", "^XA^XZ", None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            manager.start("printer_1", "  ", None).await,
            Err(AppError::Validation(_))
        ));

        let status = manager.status("printer_1").unwrap();
        assert!(!status.active);
        assert_eq!(status.poll_interval, None);
    }
}
