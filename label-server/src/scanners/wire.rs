//! Scanner wire format
//!
//! Scanners wrap each read as `star;<symbology>;<code>stop;`. Some firmware
//! omits the symbology (`star;<code>stop;`) and may prefix a counter.

use regex::Regex;
use std::sync::LazyLock;

static WITH_SYMBOLOGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)star;.*?;([^;]+)stop;?").expect("valid scan pattern")
});

static CODE_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)star;([^;]+)stop;?").expect("valid scan pattern")
});

/// Extract the scanned code from a raw line.
///
/// Non-printable bytes are dropped first. Returns `None` when the line does
/// not match either form or the code is blank.
pub fn parse_scan_line(raw: &str) -> Option<String> {
    let printable: String = raw.chars().filter(|c| (' '..='~').contains(c)).collect();

    let captured = WITH_SYMBOLOGY
        .captures(&printable)
        .or_else(|| CODE_ONLY.captures(&printable))?;

    let code = captured.get(1)?.as_str().trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
