use crate::scanners::LinkSettings;
use crate::utils::logger::LogFormat;
use std::path::PathBuf;
use std::time::Duration;
use zpl_printer::ClientSettings;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | data directory |
/// | PRINTERS_FILE | WORK_DIR/printers.json | printer registry file |
/// | SCANNERS_FILE | WORK_DIR/scanners.json | scanner configurations |
/// | SCAN_CONFIGS_FILE | WORK_DIR/scan_configs.json | print configurations per scanner and code |
/// | SCAN_EVENTS_FILE | WORK_DIR/scan_events.jsonl | scan event log |
/// | LOG_LEVEL | info | log level |
/// | LOG_FORMAT | text | `text` or `json` log lines |
/// | LOG_DIR | (unset) | rolling log directory |
/// | ENVIRONMENT | development | runtime environment |
/// | PRINTER_TIMEOUT_MS | 5000 | print job connect/write timeout |
/// | PRINTER_PROBE_TIMEOUT_MS | 3000 | probe and status query connect timeout |
/// | PRINTER_QUERY_WINDOW_MS | 500 | status query read window |
/// | PRINTER_CLOSE_GRACE_MS | 1000 | drain time after a print job |
/// | SCANNER_RECONNECT_DELAY_MS | 5000 | reconnect base delay |
/// | SCANNER_MAX_ERRORS | 10 | consecutive errors before giving up |
/// | SCANNER_HEALTH_INTERVAL_MS | 3000 | liveness sweep interval |
/// | SCANNER_IDLE_TIMEOUT_MS | 30000 | idle notice on connected scanners |
/// | SCANNER_CONNECT_TIMEOUT_MS | 30000 | scanner connect timeout |
/// | CONTINUOUS_POLL_INTERVAL_MS | 200 | default peel sensor poll interval |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | graceful shutdown limit |
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,
    pub printers_file: PathBuf,
    pub scanners_file: PathBuf,
    pub scan_configs_file: PathBuf,
    pub scan_events_file: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_dir: Option<String>,
    /// development | staging | production
    pub environment: String,

    pub printer: ClientSettings,
    pub scanner: LinkSettings,
    pub continuous_poll_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Load configuration from the environment, with defaults
    pub fn from_env() -> Self {
        let work_dir = PathBuf::from(std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()));
        let file = |key: &str, name: &str| {
            std::env::var(key)
                .map(PathBuf::from)
                .unwrap_or_else(|_| work_dir.join(name))
        };

        let ms = |key: &str, default: u64| Duration::from_millis(env_or(key, default));

        Self {
            printers_file: file("PRINTERS_FILE", "printers.json"),
            scanners_file: file("SCANNERS_FILE", "scanners.json"),
            scan_configs_file: file("SCAN_CONFIGS_FILE", "scan_configs.json"),
            scan_events_file: file("SCAN_EVENTS_FILE", "scan_events.jsonl"),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_format: std::env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            log_dir: std::env::var("LOG_DIR").ok(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            printer: ClientSettings {
                send_timeout: ms("PRINTER_TIMEOUT_MS", 5000),
                probe_timeout: ms("PRINTER_PROBE_TIMEOUT_MS", 3000),
                query_window: ms("PRINTER_QUERY_WINDOW_MS", 500),
                close_grace: ms("PRINTER_CLOSE_GRACE_MS", 1000),
            },
            scanner: LinkSettings {
                reconnect_delay: ms("SCANNER_RECONNECT_DELAY_MS", 5000),
                max_errors: env_or("SCANNER_MAX_ERRORS", 10),
                health_interval: ms("SCANNER_HEALTH_INTERVAL_MS", 3000),
                idle_timeout: ms("SCANNER_IDLE_TIMEOUT_MS", 30000),
                connect_timeout: ms("SCANNER_CONNECT_TIMEOUT_MS", 30000),
                ..LinkSettings::default()
            },
            continuous_poll_interval_ms: env_or("CONTINUOUS_POLL_INTERVAL_MS", 200),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10000),
            work_dir,
        }
    }

    /// Configuration rooted at a given work directory (tests)
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let mut config = Self::from_env();
        config.printers_file = work_dir.join("printers.json");
        config.scanners_file = work_dir.join("scanners.json");
        config.scan_configs_file = work_dir.join("scan_configs.json");
        config.scan_events_file = work_dir.join("scan_events.jsonl");
        config.work_dir = work_dir;
        config
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
