//! Label Element Model
//!
//! Elements come from the layout editor, which works in fractional dots.
//! Positions and sizes are rounded to whole dots on load and clamped at zero,
//! so the compiler only ever sees non-negative integers.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a dot value from any JSON number (or null).
///
/// Rounds half up like the editor does, clamps negatives and NaN to zero.
pub fn deserialize_dots<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(round_dots(value))
}

/// Round a fractional dot value to a non-negative integer
pub fn round_dots(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = (value + 0.5).floor();
    if rounded >= u32::MAX as f64 {
        u32::MAX
    } else {
        rounded as u32
    }
}

fn default_true() -> bool {
    true
}

/// A missing or `null` visibility flag means visible
fn deserialize_visible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// One element of a label template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_dots")]
    pub x: u32,
    #[serde(default, deserialize_with = "deserialize_dots")]
    pub y: u32,
    #[serde(default = "default_true", deserialize_with = "deserialize_visible")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(flatten)]
    pub kind: ElementKind,
}

/// Variant-specific element data, tagged by `type`.
///
/// Zero sizes mean "use the default for this element". Types the compiler
/// has no rendering for load as [`ElementKind::Unknown`] so the rest of the
/// template still prints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ElementKind {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
        #[serde(default, deserialize_with = "deserialize_dots")]
        font_size: u32,
    },
    #[serde(rename = "barcode-gs1-128")]
    Gs1128 {
        #[serde(default)]
        data: String,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        module_width: u32,
        #[serde(default)]
        show_text: bool,
    },
    #[serde(rename = "barcode-upc")]
    Upc {
        #[serde(default)]
        data: String,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
        #[serde(default)]
        show_text: bool,
    },
    #[serde(rename = "barcode-ean")]
    Ean {
        #[serde(default)]
        data: String,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
        #[serde(default)]
        show_text: bool,
    },
    #[serde(rename = "barcode-gs1-databar")]
    Databar {
        #[serde(default)]
        data: String,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        magnification: u32,
    },
    #[serde(rename = "voicepick")]
    VoicePick {
        #[serde(default)]
        text: String,
        #[serde(default, deserialize_with = "deserialize_dots")]
        width: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        font_size: u32,
    },
    #[serde(rename = "datebox")]
    DateBox {
        #[serde(default)]
        text: String,
        #[serde(default, deserialize_with = "deserialize_dots")]
        width: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        font_size: u32,
    },
    #[serde(rename = "box")]
    Rect {
        #[serde(default, deserialize_with = "deserialize_dots")]
        width: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        border_width: u32,
    },
    #[serde(rename = "line")]
    Line {
        #[serde(default, deserialize_with = "deserialize_dots")]
        width: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
    },
    #[serde(rename = "image")]
    Image {
        #[serde(default)]
        image_data: Option<String>,
        #[serde(default, deserialize_with = "deserialize_dots")]
        width: u32,
        #[serde(default, deserialize_with = "deserialize_dots")]
        height: u32,
    },
    #[serde(rename = "unknown", other)]
    Unknown,
}

impl ElementKind {
    /// The templated payload: `text` for text-like elements, `data` for
    /// barcodes. Shapes and images have none.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } | Self::VoicePick { text, .. } | Self::DateBox { text, .. } => {
                Some(text)
            }
            Self::Gs1128 { data, .. }
            | Self::Upc { data, .. }
            | Self::Ean { data, .. }
            | Self::Databar { data, .. } => Some(data),
            Self::Rect { .. } | Self::Line { .. } | Self::Image { .. } | Self::Unknown => None,
        }
    }

    pub fn payload_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::Text { text, .. } | Self::VoicePick { text, .. } | Self::DateBox { text, .. } => {
                Some(text)
            }
            Self::Gs1128 { data, .. }
            | Self::Upc { data, .. }
            | Self::Ean { data, .. }
            | Self::Databar { data, .. } => Some(data),
            Self::Rect { .. } | Self::Line { .. } | Self::Image { .. } | Self::Unknown => None,
        }
    }

    /// Element type tag as used in templates
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Gs1128 { .. } => "barcode-gs1-128",
            Self::Upc { .. } => "barcode-upc",
            Self::Ean { .. } => "barcode-ean",
            Self::Databar { .. } => "barcode-gs1-databar",
            Self::VoicePick { .. } => "voicepick",
            Self::DateBox { .. } => "datebox",
            Self::Rect { .. } => "box",
            Self::Line { .. } => "line",
            Self::Image { .. } => "image",
            Self::Unknown => "unknown",
        }
    }
}

impl LabelElement {
    /// Visible element at a position (for building templates in code)
    pub fn new(x: u32, y: u32, kind: ElementKind) -> Self {
        Self {
            id: None,
            x,
            y,
            visible: true,
            locked: false,
            kind,
        }
    }

    pub fn text(x: u32, y: u32, font_size: u32, text: impl Into<String>) -> Self {
        Self::new(
            x,
            y,
            ElementKind::Text {
                text: text.into(),
                font_size,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_dots() {
        assert_eq!(round_dots(10.4), 10);
        assert_eq!(round_dots(10.5), 11);
        assert_eq!(round_dots(-3.2), 0);
        assert_eq!(round_dots(f64::NAN), 0);
    }

    #[test]
    fn test_deserialize_editor_element() {
        let json = r#"{
            "id": "el-1",
            "type": "barcode-gs1-128",
            "x": 12.6,
            "y": -1,
            "data": "(01){{product.gtin}}",
            "height": 80,
            "moduleWidth": 2.4,
            "showText": true,
            "locked": true
        }"#;
        let el: LabelElement = serde_json::from_str(json).unwrap();
        assert_eq!(el.x, 13);
        assert_eq!(el.y, 0);
        assert!(el.visible);
        assert!(el.locked);
        assert_eq!(
            el.kind,
            ElementKind::Gs1128 {
                data: "(01){{product.gtin}}".to_string(),
                height: 80,
                module_width: 2,
                show_text: true,
            }
        );
    }

    #[test]
    fn test_missing_sizes_are_zero() {
        let el: LabelElement =
            serde_json::from_str(r#"{"type": "box", "x": 5, "y": 5, "visible": false}"#).unwrap();
        assert!(!el.visible);
        assert_eq!(
            el.kind,
            ElementKind::Rect {
                width: 0,
                height: 0,
                border_width: 0
            }
        );
        assert_eq!(el.kind.payload(), None);
    }

    #[test]
    fn test_image_and_payload_access() {
        let mut el: LabelElement = serde_json::from_str(
            r#"{"type": "image", "x": 0, "y": 0, "width": 50, "height": 20, "imageData": "data:image/png;base64,AAA"}"#,
        )
        .unwrap();
        assert!(matches!(&el.kind, ElementKind::Image { image_data: Some(_), width: 50, height: 20 }));
        assert!(el.kind.payload_mut().is_none());

        let mut text = LabelElement::text(1, 2, 30, "LOT {{lot_number}}");
        if let Some(payload) = text.kind.payload_mut() {
            *payload = "LOT A1".to_string();
        }
        assert_eq!(text.kind.payload(), Some("LOT A1"));
        assert_eq!(text.kind.type_name(), "text");
    }

    #[test]
    fn test_unknown_type_loads_as_unknown() {
        let el: LabelElement = serde_json::from_str(
            r#"{"id": "qr-1", "type": "qrcode", "x": 10, "y": 10, "data": "https://example.com", "size": 4}"#,
        )
        .unwrap();
        assert_eq!(el.kind, ElementKind::Unknown);
        assert_eq!(el.id.as_deref(), Some("qr-1"));
        assert_eq!(el.x, 10);
        assert_eq!(el.kind.payload(), None);

        let elements: Vec<LabelElement> = serde_json::from_str(
            r#"[{"type": "text", "x": 0, "y": 0, "text": "LOT"}, {"type": "qrcode", "x": 0, "y": 0}]"#,
        )
        .unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].kind.type_name(), "text");
    }

    #[test]
    fn test_null_visibility_is_visible() {
        let el: LabelElement =
            serde_json::from_str(r#"{"type": "line", "x": 0, "y": 0, "visible": null}"#).unwrap();
        assert!(el.visible);
    }
}
