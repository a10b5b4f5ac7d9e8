//! # zpl-printer
//!
//! ZPL label printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ZPL command building
//! - Barcode symbology (check digits, Code 128 / EAN-13 / UPC-A patterns)
//! - Voice-pick codes (CRC-16)
//! - Date tokens for pack dates
//! - Monochrome graphic fields from images
//! - Network printing (Zebra 6101, SATO 9100) and status queries
//!
//! Business logic (WHAT to print) stays in application code:
//! - Template variables and label compilation → label-server
//!
//! ## Example
//!
//! ```ignore
//! use zpl_printer::{Driver, NetworkPrinterClient, PrinterClient, ZplBuilder};
//!
//! let mut builder = ZplBuilder::new(812, 406);
//! builder.quantity(2);
//! builder.text(20, 20, 36, "LOT A-01");
//! builder.origin(20, 80).module_width(3).code128(80, true).field(">;>80100012345678905");
//!
//! let client = NetworkPrinterClient::default();
//! client.send("192.168.1.50", Driver::Zebra, &builder.build()).await?;
//! ```

mod date_format;
mod encoding;
mod error;
mod printer;
mod symbology;
mod zpl;

// Re-exports
pub use date_format::{MONTHS, format_date, format_token, parse_date, voice_pick_date};
pub use encoding::{escape_field_data, field_data_command, needs_field_hex, strip_data_url};
pub use error::{PrintError, PrintResult};
pub use printer::{
    ClientSettings, Driver, ExtendedStatus, NetworkPrinterClient, PeelSensorReading,
    PrinterClient, ProbeStatus, SATO_PORT, ZEBRA_PORT, endpoint, parse_extended_status,
    parse_peel_response,
};
pub use symbology::{
    add_check_digit_if_needed, check_digit, code128_values, crc16, encode_code128, encode_ean13,
    encode_upc_a, voice_pick_code,
};
pub use zpl::{GraphicField, ZplBuilder, image_to_graphic_field, pack_monochrome};
