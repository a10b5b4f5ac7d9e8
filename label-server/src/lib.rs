//! Label Server - warehouse label printing driven by network scanners
//!
//! # Overview
//!
//! - **Printing** (`printing`): label compiler, template variables, printer
//!   registry, ad hoc printer operations, continuous printing
//! - **Scanner links** (`scanners`): persistent TCP connections to network
//!   scanners with reconnect and liveness checks
//! - **Scan handling** (`scanning`): scanned code to printed labels
//!
//! # Layout
//!
//! ```text
//! label-server/src/
//! ├── core/       # configuration, state, background tasks
//! ├── printing/   # compiler, registry, printer service, continuous print
//! ├── scanners/   # scanner link manager, framing, wire format
//! ├── scanning/   # scan router, dispatcher, collaborators
//! └── utils/      # errors, logging
//! ```

pub mod core;
pub mod printing;
pub mod scanners;
pub mod scanning;
pub mod utils;

// Re-exports
pub use crate::core::{BackgroundTasks, Config, ServerState, TaskKind};
pub use printing::{ContinuousPrintManager, PrinterRegistry, PrinterService, RenderContext, compile};
pub use scanners::{ScannerEvent, ScannerLinkManager};
pub use scanning::{ScanEventRouter, ScanOutcome};
pub use utils::{AppError, AppResult};

pub use utils::logger::{LogFormat, init_logger, init_logger_with_file};

/// Load `.env`, read the configuration and initialise logging from it
pub fn setup_environment() -> AppResult<Config> {
    // A missing .env file is fine
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    init_logger_with_file(
        &config.log_level,
        config.log_format,
        config.log_dir.as_deref().map(std::path::Path::new),
    );
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    __          __         __
   / /   ____ _/ /_  ___  / /
  / /   / __ `/ __ \/ _ \/ /
 / /___/ /_/ / /_/ /  __/ /
/_____/\__,_/_.___/\___/_/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
