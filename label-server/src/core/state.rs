use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zpl_printer::{NetworkPrinterClient, PrinterClient};

use crate::core::{BackgroundTasks, Config, TaskKind};
use crate::printing::{ContinuousPrintManager, PrinterRegistry, PrinterService};
use crate::scanners::{ScannerEvent, ScannerLinkManager};
use crate::scanning::{
    ConfigResolver, JsonScanConfigSource, JsonlEventSink, ScanEventRouter, ScanEventSink,
    dispatch, load_scanners,
};
use crate::utils::AppResult;

/// Server state - shared handles to every component
///
/// | Field | Role |
/// |-------|------|
/// | registry | printer table (JSON file) |
/// | printers | ad hoc printer operations |
/// | continuous | continuous print jobs |
/// | scanners | scanner TCP links |
/// | router | scan to printed labels |
///
/// Cloning is cheap; every component is reference counted.
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub registry: Arc<PrinterRegistry>,
    pub client: Arc<dyn PrinterClient>,
    pub printers: PrinterService,
    pub continuous: ContinuousPrintManager,
    pub scanners: ScannerLinkManager,
    pub router: Arc<ScanEventRouter>,
    shutdown: CancellationToken,
}

impl ServerState {
    /// Build the state from configuration.
    ///
    /// Order:
    /// 1. work directory
    /// 2. printer registry (printers file)
    /// 3. scan configurations and event log
    /// 4. components
    ///
    /// Returns the scanner event stream to hand to [`ServerState::start`].
    pub fn initialize(
        config: &Config,
        shutdown: CancellationToken,
    ) -> AppResult<(Self, mpsc::UnboundedReceiver<ScannerEvent>)> {
        std::fs::create_dir_all(&config.work_dir)?;

        let client: Arc<dyn PrinterClient> = Arc::new(NetworkPrinterClient::new(config.printer));
        let resolver: Arc<dyn ConfigResolver> =
            Arc::new(JsonScanConfigSource::load(&config.scan_configs_file)?);
        let sink: Arc<dyn ScanEventSink> = Arc::new(JsonlEventSink::new(&config.scan_events_file));

        Ok(Self::with_components(config, client, resolver, sink, shutdown))
    }

    /// Build the state around given collaborators
    pub fn with_components(
        config: &Config,
        client: Arc<dyn PrinterClient>,
        resolver: Arc<dyn ConfigResolver>,
        sink: Arc<dyn ScanEventSink>,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<ScannerEvent>) {
        let registry = Arc::new(PrinterRegistry::load(&config.printers_file));
        let printers = PrinterService::new(registry.clone(), client.clone());
        let continuous = ContinuousPrintManager::new(
            registry.clone(),
            client.clone(),
            Duration::from_millis(config.continuous_poll_interval_ms),
            shutdown.clone(),
        );
        let (scanners, events) = ScannerLinkManager::new(config.scanner);
        let router = Arc::new(ScanEventRouter::new(
            resolver,
            sink,
            registry.clone(),
            client.clone(),
        ));

        let state = Self {
            config: config.clone(),
            registry,
            client,
            printers,
            continuous,
            scanners,
            router,
            shutdown,
        };
        (state, events)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start the background loops and connect the configured scanners.
    ///
    /// Returns the number of scanner connections attempted.
    pub async fn start(
        &self,
        tasks: &mut BackgroundTasks,
        events: mpsc::UnboundedReceiver<ScannerEvent>,
    ) -> AppResult<usize> {
        self.scanners.start(tasks);

        let router = self.router.clone();
        let token = tasks.shutdown_token();
        tasks.spawn("scan_dispatcher", TaskKind::Worker, async move {
            dispatch::run(router, events, token).await;
        });

        let scanners = load_scanners(&self.config.scanners_file)?;
        let attempted = self.scanners.initialize_all(&scanners).await;
        tracing::info!("Initialized {} scanner connection(s)", attempted);
        Ok(attempted)
    }

    /// Stop scanners, continuous jobs and background tasks
    pub async fn shutdown(&self, tasks: BackgroundTasks) {
        let limit = Duration::from_millis(self.config.shutdown_timeout_ms);
        self.scanners.shutdown();
        self.continuous.shutdown(limit).await;
        tasks.shutdown(limit).await;
        self.registry.persist_or_log().await;
    }
}
