//! Label compiler
//!
//! Turns template elements plus a [`RenderContext`] into a ZPL stream:
//! hidden elements are dropped, template variables substituted, and each
//! element emitted in input order. Zero sizes take the element default.

use super::variables::{RenderContext, substitute};
use shared::models::{ElementKind, LabelElement};
use zpl_printer::{
    ZplBuilder, add_check_digit_if_needed, encode_code128, encode_ean13, encode_upc_a,
    image_to_graphic_field,
};

const TEXT_FONT: u32 = 24;
const GS1_HEIGHT: u32 = 80;
const GS1_MODULE: u32 = 3;
const RETAIL_HEIGHT: u32 = 70;
/// Printer default `^BY` when a barcode does not set one
const DEFAULT_MODULE: u32 = 2;
const DATABAR_HEIGHT: u32 = 60;
const DATABAR_MAGNIFICATION: u32 = 2;

const VOICE_PICK_WIDTH: u32 = 100;
const VOICE_PICK_HEIGHT: u32 = 50;
const VOICE_PICK_FONT: u32 = 36;
/// Space between the large and small digit pairs
const VOICE_PICK_GAP: i64 = 4;

const DATE_BOX_WIDTH: u32 = 80;
const DATE_BOX_HEIGHT: u32 = 40;
const DATE_BOX_FONT: u32 = 18;

const BOX_WIDTH: u32 = 100;
const BOX_HEIGHT: u32 = 50;
const BOX_BORDER: u32 = 2;
const LINE_WIDTH: u32 = 200;
const LINE_HEIGHT: u32 = 2;
const IMAGE_SIZE: u32 = 100;

fn or(value: u32, default: u32) -> u32 {
    if value == 0 { default } else { value }
}

/// Round half up, as the layout editor does
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn dots(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Visible elements with their payloads substituted, in input order
pub fn resolve_elements(elements: &[LabelElement], ctx: &RenderContext) -> Vec<LabelElement> {
    elements
        .iter()
        .filter(|el| el.visible)
        .map(|el| {
            let mut resolved = el.clone();
            if let Some(payload) = resolved.kind.payload_mut() {
                *payload = substitute(payload, ctx);
            }
            resolved
        })
        .collect()
}

/// Compile a label to a ZPL command stream.
///
/// `copies > 1` emits a single `^PQ` instead of repeating the body. Image
/// elements that cannot be converted are logged and left out.
pub fn compile(
    elements: &[LabelElement],
    width: u32,
    height: u32,
    copies: u32,
    ctx: &RenderContext,
) -> String {
    let mut zpl = ZplBuilder::new(width, height);
    zpl.quantity(copies);

    for element in resolve_elements(elements, ctx) {
        emit(&mut zpl, &element);
    }

    zpl.build()
}

fn emit(zpl: &mut ZplBuilder, element: &LabelElement) {
    let (x, y) = (element.x, element.y);

    match &element.kind {
        ElementKind::Text { text, font_size } => {
            zpl.text(x, y, or(*font_size, TEXT_FONT), text);
        }

        ElementKind::Gs1128 {
            data,
            height,
            module_width,
            show_text,
        } => {
            let data: String = data.chars().filter(|c| !matches!(c, '(' | ')')).collect();
            let module = or(*module_width, GS1_MODULE);
            warn_overflow(zpl, element, encode_code128(&data, true).len(), module);

            zpl.origin(x, y)
                .module_width(module)
                .code128(or(*height, GS1_HEIGHT), *show_text)
                .field(&format!(">;>8{}", data));
        }

        ElementKind::Upc {
            data,
            height,
            show_text,
        } => {
            let data = add_check_digit_if_needed(data);
            warn_overflow(zpl, element, encode_upc_a(&data).len(), DEFAULT_MODULE);
            zpl.origin(x, y)
                .upc_a(or(*height, RETAIL_HEIGHT), *show_text)
                .field(&data);
        }

        ElementKind::Ean {
            data,
            height,
            show_text,
        } => {
            let data = add_check_digit_if_needed(data);
            warn_overflow(zpl, element, encode_ean13(&data).len(), DEFAULT_MODULE);
            zpl.origin(x, y)
                .ean13(or(*height, RETAIL_HEIGHT), *show_text)
                .field(&data);
        }

        ElementKind::Databar {
            data,
            height,
            magnification,
        } => {
            let digits: String = data.chars().filter(char::is_ascii_digit).collect();
            zpl.origin(x, y)
                .databar(
                    or(*magnification, DATABAR_MAGNIFICATION),
                    or(*height, DATABAR_HEIGHT),
                )
                .field(&digits);
        }

        ElementKind::VoicePick {
            text,
            width,
            height,
            font_size,
        } => emit_voice_pick(
            zpl,
            x,
            y,
            text,
            or(*width, VOICE_PICK_WIDTH),
            or(*height, VOICE_PICK_HEIGHT),
            or(*font_size, VOICE_PICK_FONT),
        ),

        ElementKind::DateBox {
            text,
            width,
            height,
            font_size,
        } => {
            zpl.origin(x, y).graphic_box(
                or(*width, DATE_BOX_WIDTH),
                or(*height, DATE_BOX_HEIGHT),
                2,
            );
            zpl.text(
                x.saturating_add(5),
                y.saturating_add(10),
                or(*font_size, DATE_BOX_FONT),
                text,
            );
        }

        ElementKind::Rect {
            width,
            height,
            border_width,
        } => {
            zpl.origin(x, y).graphic_box(
                or(*width, BOX_WIDTH),
                or(*height, BOX_HEIGHT),
                or(*border_width, BOX_BORDER),
            );
        }

        ElementKind::Line { width, height } => {
            let thickness = or(*height, LINE_HEIGHT);
            zpl.origin(x, y)
                .graphic_box(or(*width, LINE_WIDTH), thickness, thickness);
        }

        ElementKind::Image {
            image_data,
            width,
            height,
        } => {
            let Some(data) = image_data.as_deref().filter(|d| !d.is_empty()) else {
                tracing::debug!(element = ?element.id, "Image element has no image data");
                return;
            };
            let (w, h) = (or(*width, IMAGE_SIZE), or(*height, IMAGE_SIZE));
            match image_to_graphic_field(data, w, h) {
                Ok(field) => {
                    zpl.origin(x, y).graphic_field(&field);
                }
                Err(e) => {
                    tracing::warn!(element = ?element.id, error = %e, "Image conversion failed, element omitted");
                }
            }
        }

        ElementKind::Unknown => {
            tracing::warn!(element = ?element.id, x, y, "Unsupported element type, element omitted");
        }
    }
}

/// Voice-pick code `XX-XX` as two reversed digit pairs (large, then small)
/// centered in a black box. Character width is taken as 0.6 × font size.
fn emit_voice_pick(
    zpl: &mut ZplBuilder,
    x: u32,
    y: u32,
    text: &str,
    box_width: u32,
    box_height: u32,
    large_font: u32,
) {
    let mut parts = text.split('-');
    let first = parts.next().filter(|p| !p.is_empty()).unwrap_or("00");
    let second = parts.next().filter(|p| !p.is_empty()).unwrap_or("00");

    let large = large_font as i64;
    let small = round_half_up(large as f64 * 0.6);
    let large_char = round_half_up(large as f64 * 0.6);
    let small_char = round_half_up(small as f64 * 0.6);
    let total = large_char * 2 + VOICE_PICK_GAP + small_char * 2;

    let (x0, y0) = (x as i64, y as i64);
    let start_x = x0 + round_half_up((box_width as i64 - total) as f64 / 2.0);
    let large_y = y0 + round_half_up((box_height as i64 - large) as f64 / 2.0);
    let small_y = y0 + round_half_up((box_height as i64 - small) as f64 / 2.0);
    let second_x = start_x + large_char * 2 + VOICE_PICK_GAP;

    zpl.origin(x, y).filled_box(box_width, box_height);
    zpl.origin(dots(start_x), dots(large_y))
        .reverse_font(large_font)
        .field(first);
    zpl.origin(dots(second_x), dots(small_y))
        .reverse_font(dots(small))
        .field(second);
}

fn warn_overflow(zpl: &ZplBuilder, element: &LabelElement, modules: usize, module_width: u32) {
    let extent = element.x as u64 + modules as u64 * module_width as u64;
    if extent > zpl.width() as u64 {
        tracing::warn!(
            element = ?element.id,
            kind = element.kind.type_name(),
            extent,
            label_width = zpl.width(),
            "Barcode extends past the label width"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::models::ProductRecord;

    fn ctx() -> RenderContext {
        let mut ctx = RenderContext::new(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        ctx.product = ProductRecord::new().with("gtin", "00012345678905");
        ctx.lot_number = Some("L1".into());
        ctx
    }

    fn element(x: u32, y: u32, kind: ElementKind) -> LabelElement {
        LabelElement::new(x, y, kind)
    }

    #[test]
    fn test_header_quantity_and_terminator() {
        let zpl = compile(&[], 812, 406, 3, &ctx());
        assert_eq!(zpl, "^XA\n^PW812\n^LL406\n^CI28\n^PQ3,0,0,N\n^XZ");

        let single = compile(&[], 812, 406, 1, &ctx());
        assert!(!single.contains("^PQ"));
    }

    #[test]
    fn test_text_with_fallback() {
        let mut empty = ctx();
        empty.product = ProductRecord::new();
        let elements = vec![LabelElement::text(10, 20, 0, "{{product.gtin|UNKNOWN}}")];

        let zpl = compile(&elements, 812, 406, 1, &empty);
        assert!(zpl.contains("^FO10,20\n^A0N,24,24\n^FDUNKNOWN^FS\n"));

        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(zpl.contains("^FD00012345678905^FS"));
    }

    #[test]
    fn test_hidden_elements_are_skipped() {
        let mut hidden = LabelElement::text(0, 0, 30, "HIDDEN");
        hidden.visible = false;
        let zpl = compile(&[hidden], 812, 406, 1, &ctx());
        assert!(!zpl.contains("HIDDEN"));
    }

    #[test]
    fn test_gs1_128_payload() {
        let elements = vec![element(
            20,
            100,
            ElementKind::Gs1128 {
                data: "(01){{product.gtin}}(10){{lot_number}}".into(),
                height: 0,
                module_width: 0,
                show_text: true,
            },
        )];

        let resolved = resolve_elements(&elements, &ctx());
        assert_eq!(resolved[0].kind.payload(), Some("(01)00012345678905(10)L1"));

        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(zpl.contains("^FO20,100\n^BY3\n^BCN,80,Y,N,N\n^FD>;>8010001234567890510L1^FS\n"));
    }

    #[test]
    fn test_barcode_payload_substitution() {
        let elements = vec![element(
            0,
            0,
            ElementKind::Gs1128 {
                data: "{{product.gtin}}{{lot_number}}".into(),
                height: 0,
                module_width: 0,
                show_text: false,
            },
        )];
        let resolved = resolve_elements(&elements, &ctx());
        assert_eq!(resolved[0].kind.payload(), Some("00012345678905L1"));
    }

    #[test]
    fn test_retail_barcodes_get_check_digits() {
        let elements = vec![
            element(
                0,
                0,
                ElementKind::Upc {
                    data: "03600029145".into(),
                    height: 0,
                    show_text: true,
                },
            ),
            element(
                0,
                100,
                ElementKind::Ean {
                    data: "4006381333931".into(),
                    height: 90,
                    show_text: false,
                },
            ),
        ];
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(zpl.contains("^BUN,70,Y,N,Y\n^FD036000291452^FS\n"));
        assert!(zpl.contains("^BEN,90,N,N,Y\n^FD4006381333931^FS\n"));
    }

    #[test]
    fn test_databar_digits_only() {
        let elements = vec![element(
            5,
            5,
            ElementKind::Databar {
                data: "(01)00012345678905".into(),
                height: 0,
                magnification: 0,
            },
        )];
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(zpl.contains("^FO5,5\n^BRN,1,2,1,60,22\n^FD0100012345678905^FS\n"));
    }

    #[test]
    fn test_voice_pick_layout() {
        let elements = vec![element(
            10,
            20,
            ElementKind::VoicePick {
                text: "07-73".into(),
                width: 0,
                height: 0,
                font_size: 0,
            },
        )];
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        let expected = "^FO10,20\n^GB100,50,50,B^FS\n\
                        ^FO23,27\n^FR^A0N,36,36\n^FD07^FS\n\
                        ^FO71,34\n^FR^A0N,22,22\n^FD73^FS\n";
        assert!(zpl.contains(expected), "{}", zpl);
    }

    #[test]
    fn test_voice_pick_missing_parts() {
        let elements = vec![element(
            0,
            0,
            ElementKind::VoicePick {
                text: String::new(),
                width: 0,
                height: 0,
                font_size: 0,
            },
        )];
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert_eq!(zpl.matches("^FD00^FS").count(), 2);
    }

    #[test]
    fn test_shapes_and_date_box() {
        let elements = vec![
            element(
                0,
                0,
                ElementKind::Rect {
                    width: 0,
                    height: 0,
                    border_width: 0,
                },
            ),
            element(
                0,
                60,
                ElementKind::Line {
                    width: 400,
                    height: 0,
                },
            ),
            element(
                100,
                100,
                ElementKind::DateBox {
                    text: "JAN15".into(),
                    width: 0,
                    height: 0,
                    font_size: 0,
                },
            ),
        ];
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(zpl.contains("^FO0,0\n^GB100,50,2^FS\n"));
        assert!(zpl.contains("^FO0,60\n^GB400,2,2^FS\n"));
        assert!(zpl.contains("^FO100,100\n^GB80,40,2^FS\n^FO105,110\n^A0N,18,18\n^FDJAN15^FS\n"));
    }

    #[test]
    fn test_bad_image_is_omitted() {
        let elements = vec![
            element(
                0,
                0,
                ElementKind::Image {
                    image_data: Some("not an image".into()),
                    width: 0,
                    height: 0,
                },
            ),
            element(
                0,
                0,
                ElementKind::Image {
                    image_data: None,
                    width: 0,
                    height: 0,
                },
            ),
            LabelElement::text(0, 0, 0, "after"),
        ];
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(!zpl.contains("^GFA"));
        assert!(zpl.contains("^FDafter^FS"));
    }

    #[test]
    fn test_unsupported_element_is_skipped() {
        let elements: Vec<LabelElement> = serde_json::from_str(
            r#"[
                {"type": "text", "x": 10, "y": 10, "text": "{{lot_number}}", "visible": null},
                {"type": "qrcode", "x": 200, "y": 10, "data": "{{product.gtin}}"},
                {"type": "line", "x": 0, "y": 60, "width": 400}
            ]"#,
        )
        .unwrap();
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(zpl.contains("^FO10,10\n^A0N,24,24\n^FDL1^FS\n"));
        assert!(zpl.contains("^FO0,60\n^GB400,2,2^FS\n"));
        assert!(!zpl.contains("^FO200,10"));
        assert!(!zpl.contains("00012345678905"));
    }

    #[test]
    fn test_control_characters_are_escaped() {
        let elements = vec![LabelElement::text(0, 0, 0, "A^B")];
        let zpl = compile(&elements, 812, 406, 1, &ctx());
        assert!(zpl.contains("^FH^FDA_5EB^FS"));
    }
}
