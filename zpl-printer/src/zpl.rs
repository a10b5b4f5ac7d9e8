//! ZPL command builder
//!
//! Provides a fluent API for building ZPL II label streams.

use crate::encoding::field_data_command;
use crate::error::{PrintError, PrintResult};
use std::fmt::Write as _;

/// ZPL command builder
///
/// `new` writes the job header (`^XA`, print width, label length, UTF-8
/// character set); `build` appends the `^XZ` terminator.
pub struct ZplBuilder {
    buf: String,
    width: u32,
}

impl ZplBuilder {
    /// Start a label of `width` × `height` dots
    pub fn new(width: u32, height: u32) -> Self {
        let mut buf = String::with_capacity(1024);
        let _ = write!(buf, "^XA\n^PW{}\n^LL{}\n^CI28\n", width, height);
        Self { buf, width }
    }

    /// Configured print width in dots
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Print quantity. One copy is the printer default, so nothing is
    /// emitted for `copies <= 1`.
    pub fn quantity(&mut self, copies: u32) -> &mut Self {
        if copies > 1 {
            let _ = writeln!(self.buf, "^PQ{},0,0,N", copies);
        }
        self
    }

    // === Fields ===

    /// Field origin (`^FO`)
    pub fn origin(&mut self, x: u32, y: u32) -> &mut Self {
        let _ = writeln!(self.buf, "^FO{},{}", x, y);
        self
    }

    /// Scalable font 0, normal orientation
    pub fn font(&mut self, size: u32) -> &mut Self {
        let _ = writeln!(self.buf, "^A0N,{},{}", size, size);
        self
    }

    /// Scalable font 0 with field reverse (white on black)
    pub fn reverse_font(&mut self, size: u32) -> &mut Self {
        let _ = writeln!(self.buf, "^FR^A0N,{},{}", size, size);
        self
    }

    /// Field data, closed with `^FS`
    pub fn field(&mut self, data: &str) -> &mut Self {
        self.buf.push_str(&field_data_command(data));
        self.buf.push('\n');
        self
    }

    /// Text at a position in font 0
    pub fn text(&mut self, x: u32, y: u32, size: u32, data: &str) -> &mut Self {
        self.origin(x, y).font(size).field(data)
    }

    // === Barcodes ===

    /// Module width (`^BY`)
    pub fn module_width(&mut self, dots: u32) -> &mut Self {
        let _ = writeln!(self.buf, "^BY{}", dots);
        self
    }

    /// Code 128 (`^BC`). Field data may carry subset/FNC1 invocation codes.
    pub fn code128(&mut self, height: u32, human_readable: bool) -> &mut Self {
        let _ = writeln!(self.buf, "^BCN,{},{},N,N", height, yes_no(human_readable));
        self
    }

    /// UPC-A (`^BU`), check digit printed
    pub fn upc_a(&mut self, height: u32, human_readable: bool) -> &mut Self {
        let _ = writeln!(self.buf, "^BUN,{},{},N,Y", height, yes_no(human_readable));
        self
    }

    /// EAN-13 (`^BE`), check digit printed
    pub fn ean13(&mut self, height: u32, human_readable: bool) -> &mut Self {
        let _ = writeln!(self.buf, "^BEN,{},{},N,Y", height, yes_no(human_readable));
        self
    }

    /// GS1 DataBar omnidirectional (`^BR`)
    pub fn databar(&mut self, magnification: u32, height: u32) -> &mut Self {
        let _ = writeln!(self.buf, "^BRN,1,{},1,{},22", magnification, height);
        self
    }

    // === Graphics ===

    /// Outlined box (`^GB`)
    pub fn graphic_box(&mut self, width: u32, height: u32, thickness: u32) -> &mut Self {
        let _ = writeln!(self.buf, "^GB{},{},{}^FS", width, height, thickness);
        self
    }

    /// Box filled black, used as the background for reversed fields
    pub fn filled_box(&mut self, width: u32, height: u32) -> &mut Self {
        let _ = writeln!(self.buf, "^GB{},{},{},B^FS", width, height, height);
        self
    }

    /// ASCII-hex graphic field (`^GFA`)
    pub fn graphic_field(&mut self, field: &GraphicField) -> &mut Self {
        let total = field.total_bytes();
        let _ = write!(
            self.buf,
            "^GFA,{},{},{},\n{}^FS\n",
            total,
            total,
            field.bytes_per_row,
            field.to_hex()
        );
        self
    }

    // === Raw Commands ===

    /// Write a raw command string
    pub fn raw(&mut self, command: &str) -> &mut Self {
        self.buf.push_str(command);
        self
    }

    // === Build ===

    /// Finish the label and return the command stream
    pub fn build(mut self) -> String {
        self.buf.push_str("^XZ");
        self.buf
    }
}

fn yes_no(flag: bool) -> char {
    if flag { 'Y' } else { 'N' }
}

// ============================================================================
// Graphic Fields
// ============================================================================

/// 1-bit bitmap packed for `^GF`: rows padded to whole bytes, MSB first,
/// set bit = printed dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicField {
    pub bytes_per_row: u32,
    pub rows: u32,
    pub data: Vec<u8>,
}

impl GraphicField {
    pub fn total_bytes(&self) -> u32 {
        self.bytes_per_row * self.rows
    }

    /// Upper-case hex payload
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.data)
    }
}

/// Pack a `width` × `height` bitmap, asking `is_black(x, y)` for each dot.
pub fn pack_monochrome(width: u32, height: u32, is_black: impl Fn(u32, u32) -> bool) -> GraphicField {
    let bytes_per_row = width.div_ceil(8);
    let mut data = Vec::with_capacity((bytes_per_row * height) as usize);

    for y in 0..height {
        for x_byte in 0..bytes_per_row {
            let mut byte = 0u8;
            for bit in 0..8 {
                let x = x_byte * 8 + bit;
                if x < width && is_black(x, y) {
                    byte |= 1 << (7 - bit);
                }
            }
            data.push(byte);
        }
    }

    GraphicField {
        bytes_per_row,
        rows: height,
        data,
    }
}

/// Decode a base64 image (optionally a data URL) into a graphic field of
/// exactly `width` × `height` dots.
///
/// The image is stretched to the box, converted to luminance, and
/// thresholded at mid-gray. Transparent pixels print as white.
#[cfg(feature = "image")]
#[tracing::instrument(skip(data), fields(len = data.len()))]
pub fn image_to_graphic_field(data: &str, width: u32, height: u32) -> PrintResult<GraphicField> {
    use base64::Engine;
    use image::imageops::FilterType;

    if width == 0 || height == 0 {
        return Err(PrintError::Image(format!("invalid target size {}x{}", width, height)));
    }

    let raw = crate::encoding::strip_data_url(data);
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw.as_bytes())
        .map_err(|e| PrintError::Image(format!("base64: {}", e)))?;

    let img = image::load_from_memory(&bytes).map_err(|e| PrintError::Image(e.to_string()))?;
    let rgba = img.resize_exact(width, height, FilterType::Triangle).to_rgba8();

    let field = pack_monochrome(width, height, |x, y| {
        let pixel = rgba.get_pixel(x, y);
        if pixel[3] < 128 {
            return false;
        }
        let luma = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
        luma < 128.0
    });

    tracing::debug!(
        total_bytes = field.total_bytes(),
        bytes_per_row = field.bytes_per_row,
        "image converted to graphic field"
    );
    Ok(field)
}

#[cfg(not(feature = "image"))]
pub fn image_to_graphic_field(_data: &str, _width: u32, _height: u32) -> PrintResult<GraphicField> {
    Err(PrintError::Image("image support not compiled in".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_terminator() {
        let b = ZplBuilder::new(812, 406);
        assert_eq!(b.build(), "^XA\n^PW812\n^LL406\n^CI28\n^XZ");
    }

    #[test]
    fn test_quantity_only_above_one() {
        let mut b = ZplBuilder::new(100, 100);
        b.quantity(1);
        assert!(!b.build().contains("^PQ"));

        let mut b = ZplBuilder::new(100, 100);
        b.quantity(5);
        assert!(b.build().contains("^PQ5,0,0,N\n"));
    }

    #[test]
    fn test_text_field() {
        let mut b = ZplBuilder::new(400, 200);
        b.text(10, 20, 30, "HELLO");
        let zpl = b.build();
        assert!(zpl.contains("^FO10,20\n^A0N,30,30\n^FDHELLO^FS\n"));
    }

    #[test]
    fn test_barcode_commands() {
        let mut b = ZplBuilder::new(400, 200);
        b.origin(0, 0).module_width(3).code128(80, true).field(">;>80100012345678905");
        b.origin(0, 0).upc_a(70, false).field("036000291452");
        b.origin(0, 0).ean13(70, true).field("4006381333931");
        b.origin(0, 0).databar(2, 60).field("0100012345678905");
        let zpl = b.build();
        assert!(zpl.contains("^BY3\n^BCN,80,Y,N,N\n^FD>;>80100012345678905^FS\n"));
        assert!(zpl.contains("^BUN,70,N,N,Y\n"));
        assert!(zpl.contains("^BEN,70,Y,N,Y\n"));
        assert!(zpl.contains("^BRN,1,2,1,60,22\n"));
    }

    #[test]
    fn test_boxes() {
        let mut b = ZplBuilder::new(400, 200);
        b.graphic_box(100, 50, 2).filled_box(80, 40);
        let zpl = b.build();
        assert!(zpl.contains("^GB100,50,2^FS\n"));
        assert!(zpl.contains("^GB80,40,40,B^FS\n"));
    }

    #[test]
    fn test_pack_monochrome_pads_rows() {
        // 10 dots wide: 2 bytes per row, only the first dot black
        let field = pack_monochrome(10, 2, |x, _| x == 0);
        assert_eq!(field.bytes_per_row, 2);
        assert_eq!(field.total_bytes(), 4);
        assert_eq!(field.data, vec![0x80, 0x00, 0x80, 0x00]);
        assert_eq!(field.to_hex(), "80008000");
    }

    #[test]
    fn test_graphic_field_command() {
        let field = pack_monochrome(8, 1, |_, _| true);
        let mut b = ZplBuilder::new(100, 100);
        b.origin(5, 5).graphic_field(&field);
        assert!(b.build().contains("^FO5,5\n^GFA,1,1,1,\nFF^FS\n"));
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_image_to_graphic_field() {
        use base64::Engine;
        use image::{ImageFormat, Rgba, RgbaImage};

        // Left half black, right half white
        let img = RgbaImage::from_fn(16, 4, |x, _| {
            if x < 8 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, ImageFormat::Png).unwrap();
        let b64 = base64::engine::general_purpose::STANDARD.encode(png.into_inner());

        let field = image_to_graphic_field(&format!("data:image/png;base64,{}", b64), 16, 4).unwrap();
        assert_eq!(field.bytes_per_row, 2);
        assert_eq!(field.rows, 4);
        assert_eq!(field.data, vec![0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00]);
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_image_garbage_is_error() {
        assert!(matches!(
            image_to_graphic_field("not base64 !!", 10, 10),
            Err(PrintError::Image(_))
        ));
    }
}
