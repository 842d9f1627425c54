use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single decoded cell. Decoders map every source value into one of
/// these variants; nothing downstream ever sees an untyped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// The cell as trimmed text, if it holds non-empty text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// One decoded row, keyed by column header.
pub type RawRecord = BTreeMap<String, CellValue>;

/// The decoded contents of one uploaded file. `headers` preserves the
/// column order of row 1; `rows` hold the remaining lines. Zero rows is
/// a valid terminal state ("no data"), not an error.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A raw record resolved into its three semantic fields. Intermediate
/// only; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Year-month bucket, "YYYY-MM".
    pub period: String,
    pub category: String,
    pub measure: f64,
}

/// The summed result per unique (month, region) pair. The serialized
/// field names are load-bearing: chart suggestions returned by the
/// model reference them as `dataKeys`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    pub month: String,
    pub region: String,
    pub revenue: f64,
}

impl AggregatedRecord {
    /// The field names consumers (and the model) may reference.
    pub fn field_names() -> &'static [&'static str] {
        &["month", "region", "revenue"]
    }
}
