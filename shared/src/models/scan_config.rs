//! Print Configuration Model
//!
//! What to print when a scanner reads a given location code: one record per
//! group configuration matched for the scanner and code.

use crate::models::{LabelElement, ProductRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Location code matched when a scanned code has no configuration of its own
pub const DEFAULT_CODE: &str = "DEFAULT";

fn default_copies() -> u32 {
    1
}

/// Resolved print configuration for one scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrintConfiguration {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub location_code: Option<String>,
    #[serde(default)]
    pub printer_id: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    /// Template elements; `None` when no template is assigned
    #[serde(default)]
    pub elements: Option<Vec<LabelElement>>,
    #[serde(default)]
    pub label_width: u32,
    #[serde(default)]
    pub label_height: u32,
    #[serde(default = "default_copies")]
    pub copies: u32,
    #[serde(default)]
    pub lot_number: Option<String>,
    #[serde(default)]
    pub pack_date: Option<String>,
    #[serde(default)]
    pub pack_date_format: Option<String>,
    #[serde(default)]
    pub pack_date_offset: i64,
    /// Values for `{{custom.<key>}}` variables
    #[serde(default)]
    pub variable_values: Map<String, Value>,
    #[serde(default)]
    pub product: ProductRecord,
}

impl PrintConfiguration {
    /// Copies to print; zero means one
    pub fn effective_copies(&self) -> u32 {
        self.copies.max(1)
    }

    /// Display name for results and logs
    pub fn display_name(&self) -> &str {
        self.group_name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("(unnamed)")
    }
}
