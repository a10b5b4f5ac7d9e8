//! Field data encoding for ZPL
//!
//! ZPL treats `^` and `~` as command prefixes anywhere in the stream, so field
//! data carrying them must go through the `^FH` hex-escape mechanism.

use std::borrow::Cow;

/// Escape character used with `^FH` (the ZPL default).
pub const FIELD_HEX_INDICATOR: char = '_';

/// Whether field data needs `^FH` escaping
pub fn needs_field_hex(data: &str) -> bool {
    data.contains(['^', '~'])
}

/// Escape field data for use after `^FH^FD`.
///
/// The indicator itself is escaped too, since under `^FH` a bare `_` starts a
/// hex pair.
pub fn escape_field_data(data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 8);
    for c in data.chars() {
        match c {
            FIELD_HEX_INDICATOR => out.push_str("_5F"),
            '^' => out.push_str("_5E"),
            '~' => out.push_str("_7E"),
            _ => out.push(c),
        }
    }
    out
}

/// Field data command (`^FD...^FS`), switching to `^FH` only when required.
pub fn field_data_command(data: &str) -> String {
    if needs_field_hex(data) {
        format!("^FH^FD{}^FS", escape_field_data(data))
    } else {
        format!("^FD{}^FS", data)
    }
}

/// Strip a `data:image/<kind>;base64,` prefix from an image payload.
///
/// Payloads without the prefix are returned as-is.
pub fn strip_data_url(data: &str) -> Cow<'_, str> {
    let trimmed = data.trim();
    if let Some(rest) = trimmed.strip_prefix("data:image/")
        && let Some((kind, payload)) = rest.split_once(";base64,")
        && !kind.is_empty()
        && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Cow::Borrowed(payload);
    }
    Cow::Borrowed(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_data_untouched() {
        assert!(!needs_field_hex("LOT_A 12/31"));
        assert_eq!(field_data_command("LOT_A 12/31"), "^FDLOT_A 12/31^FS");
    }

    #[test]
    fn test_control_chars_are_hex_escaped() {
        assert!(needs_field_hex("A^B"));
        assert_eq!(field_data_command("A^B~C_D"), "^FH^FDA_5EB_7EC_5FD^FS");
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,iVBORw0"), "iVBORw0");
        assert_eq!(strip_data_url("data:image/jpeg;base64,/9j/4AAQ"), "/9j/4AAQ");
        assert_eq!(strip_data_url("iVBORw0"), "iVBORw0");
        assert_eq!(strip_data_url("data:text/plain;base64,abc"), "data:text/plain;base64,abc");
    }
}
