//! Logging Infrastructure
//!
//! Console output, plus a daily rolling `label-server` file when the log
//! directory exists. `LOG_FORMAT=json` switches both sinks to one JSON object
//! per line with the event fields flattened, for log shippers.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Line format shared by the console and file sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` is plain text
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Filter directives when `RUST_LOG` is unset
pub fn default_directives(level: &str) -> String {
    format!("label_server={level},zpl_printer={level},{level}")
}

/// Initialize console-only text logging at `info`
pub fn init_logger() {
    init_logger_with_file("info", LogFormat::Text, None);
}

/// Initialize the logger with optional file output
///
/// `RUST_LOG` takes precedence over `level` when set. File output is used
/// only when `log_dir` is an existing directory.
pub fn init_logger_with_file(level: &str, format: LogFormat, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let mut layers = vec![console_layer(format)];
    if let Some(dir) = log_dir.filter(|dir| dir.is_dir()) {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, "label-server");
        layers.push(file_layer(format, appender));
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, appender: RollingFileAppender) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(appender)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_target(true)
            .with_writer(appender)
            .boxed(),
    }
}
