//! Template variable substitution
//!
//! Tokens have the form `{{namespace.key[(±days)][|fallback]}}`:
//!
//! | Token | Value |
//! |-------|-------|
//! | `{{product.<field>}}` | product field (direct, `product_` prefixed, or nested) |
//! | `{{product.<field>_check}}` | field with a GS1 check digit appended if missing |
//! | `{{date.<FORMAT>(±N)}}` | pack date in FORMAT, shifted N days |
//! | `{{lot_number}}`, `{{pack_date}}` | configuration values |
//! | `{{voice_pick}}` | PTI voice-pick code |
//! | `{{custom.<key>}}` | configuration custom variable |
//!
//! Missing values take the fallback, else the empty string. Passes run in
//! the order of the table above. Text that matches no pattern is kept as-is.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use shared::models::{PrintConfiguration, ProductRecord, value_text};
use std::sync::LazyLock;
use zpl_printer::{add_check_digit_if_needed, format_date, voice_pick_code, voice_pick_date};

static PRODUCT_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{product\.([A-Za-z0-9_]+)(?:\|([^}]*))?\}\}").expect("valid product pattern")
});

static DATE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{date\.([A-Za-z0-9_]+(?:[-/][A-Za-z0-9_]+)*)(?:\(([+-]?\d+)\))?(?:\|([^}]*))?\}\}")
        .expect("valid date pattern")
});

static LOT_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{lot_number(?:\|([^}]*))?\}\}").expect("valid lot pattern")
});

static PACK_DATE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{pack_date(?:\|([^}]*))?\}\}").expect("valid pack date pattern")
});

static VOICE_PICK_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{voice_pick(?:\|([^}]*))?\}\}").expect("valid voice pick pattern")
});

static CUSTOM_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{custom\.([A-Za-z0-9_]+)(?:\|([^}]*))?\}\}").expect("valid custom pattern")
});

/// Voice-pick code that means "nothing to derive from"
const EMPTY_VOICE_PICK: &str = "00-00";

/// Values available to template variables for one print request
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub product: ProductRecord,
    pub lot_number: Option<String>,
    /// Pack date as entered (`MM/DD/YY` or `YYYY-MM-DD`)
    pub pack_date: Option<String>,
    /// Date token used for the voice-pick checksum (default `YYMMDD`)
    pub pack_date_format: Option<String>,
    pub pack_date_offset: i64,
    pub custom: Map<String, Value>,
    /// Base date of the voice-pick token
    pub today: NaiveDate,
}

impl RenderContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            product: ProductRecord::default(),
            lot_number: None,
            pack_date: None,
            pack_date_format: None,
            pack_date_offset: 0,
            custom: Map::new(),
            today,
        }
    }

    /// Context for a resolved print configuration
    pub fn from_config(config: &PrintConfiguration, today: NaiveDate) -> Self {
        Self {
            product: config.product.clone(),
            lot_number: config.lot_number.clone(),
            pack_date: config.pack_date.clone(),
            pack_date_format: config.pack_date_format.clone(),
            pack_date_offset: config.pack_date_offset,
            custom: config.variable_values.clone(),
            today,
        }
    }

    /// Voice-pick code for this context
    pub fn voice_pick(&self) -> String {
        let format = self
            .pack_date_format
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or("YYMMDD");
        let date_token = voice_pick_date(self.today, format, self.pack_date_offset);
        voice_pick_code(
            &self.product.gtin().unwrap_or_default(),
            self.lot_number.as_deref().unwrap_or(""),
            &date_token,
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn fallback(caps: &Captures<'_>, group: usize) -> String {
    caps.get(group).map(|m| m.as_str().to_string()).unwrap_or_default()
}

/// Substitute every template variable in `text`
pub fn substitute(text: &str, ctx: &RenderContext) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }

    let result = PRODUCT_VAR.replace_all(text, |caps: &Captures<'_>| {
        let field = &caps[1];
        let value = match field.strip_suffix("_check") {
            Some(base) => ctx.product.lookup(base).map(|v| add_check_digit_if_needed(&v)),
            None => ctx.product.lookup(field),
        };
        value.unwrap_or_else(|| fallback(caps, 2))
    });

    let pack_date = ctx.pack_date.as_deref().unwrap_or("");
    let result = DATE_VAR.replace_all(&result, |caps: &Captures<'_>| {
        let offset = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0);
        let formatted = format_date(pack_date, &caps[1], offset);
        if formatted.is_empty() {
            fallback(caps, 3)
        } else {
            formatted
        }
    });

    let result = LOT_VAR.replace_all(&result, |caps: &Captures<'_>| {
        non_empty(&ctx.lot_number)
            .map(str::to_string)
            .unwrap_or_else(|| fallback(caps, 1))
    });

    let result = PACK_DATE_VAR.replace_all(&result, |caps: &Captures<'_>| {
        non_empty(&ctx.pack_date)
            .map(str::to_string)
            .unwrap_or_else(|| fallback(caps, 1))
    });

    let result = if VOICE_PICK_VAR.is_match(&result) {
        let code = ctx.voice_pick();
        VOICE_PICK_VAR
            .replace_all(&result, |caps: &Captures<'_>| match caps.get(1) {
                Some(fb) if code == EMPTY_VOICE_PICK => fb.as_str().to_string(),
                _ => code.clone(),
            })
            .into_owned()
    } else {
        result.into_owned()
    };

    CUSTOM_VAR
        .replace_all(&result, |caps: &Captures<'_>| {
            ctx.custom
                .get(&caps[1])
                .and_then(value_text)
                .unwrap_or_else(|| fallback(caps, 2))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn ctx() -> RenderContext {
        let mut ctx = RenderContext::new(today());
        ctx.product = ProductRecord::new()
            .with("gtin", "00012345678905")
            .with("product_description", "Roma Tomatoes")
            .with("product", json!({"commodity": "Tomato", "external_upc": "03600029145"}));
        ctx.lot_number = Some("L1".into());
        ctx.pack_date = Some("01/15/25".into());
        ctx.custom.insert("grower".into(), json!("Sunny Acres"));
        ctx.custom.insert("pallets".into(), json!(12));
        ctx
    }

    #[test]
    fn test_product_lookup_paths() {
        let ctx = ctx();
        assert_eq!(substitute("{{product.gtin}}", &ctx), "00012345678905");
        assert_eq!(substitute("{{product.description}}", &ctx), "Roma Tomatoes");
        assert_eq!(substitute("{{product.commodity}}", &ctx), "Tomato");
        assert_eq!(substitute("{{product.external_upc_check}}", &ctx), "036000291452");
    }

    #[test]
    fn test_missing_values_take_fallback() {
        let empty = RenderContext::new(today());
        assert_eq!(substitute("{{product.gtin|UNKNOWN}}", &empty), "UNKNOWN");
        assert_eq!(substitute("[{{product.gtin}}]", &empty), "[]");
        assert_eq!(substitute("{{lot_number|NO LOT}}", &empty), "NO LOT");
        assert_eq!(substitute("{{pack_date|n/a}}", &empty), "n/a");
        assert_eq!(substitute("{{date.YYMMDD|none}}", &empty), "none");
        assert_eq!(substitute("{{custom.grower|-}}", &empty), "-");
    }

    #[test]
    fn test_concatenated_barcode_payload() {
        assert_eq!(
            substitute("{{product.gtin}}{{lot_number}}", &ctx()),
            "00012345678905L1"
        );
    }

    #[test]
    fn test_date_tokens() {
        let ctx = ctx();
        assert_eq!(substitute("{{date.YYMMDD(+5)}}", &ctx), "250120");
        assert_eq!(substitute("{{date.MM/DD/YY}}", &ctx), "01/15/25");
        assert_eq!(substitute("{{date.YYYY-MM-DD(-15)}}", &ctx), "2024-12-31");
        assert_eq!(substitute("{{pack_date}}", &ctx), "01/15/25");
    }

    #[test]
    fn test_custom_values() {
        let ctx = ctx();
        assert_eq!(substitute("{{custom.grower}} x{{custom.pallets}}", &ctx), "Sunny Acres x12");
    }

    #[test]
    fn test_voice_pick() {
        let ctx = ctx();
        let expected = voice_pick_code("00012345678905", "L1", "250115");
        assert_eq!(substitute("{{voice_pick}}", &ctx), expected);
        assert_eq!(ctx.voice_pick(), expected);
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        let ctx = ctx();
        assert_eq!(substitute("{{unknown}} {{product.}}", &ctx), "{{unknown}} {{product.}}");
        assert_eq!(substitute("plain text", &ctx), "plain text");
    }
}
