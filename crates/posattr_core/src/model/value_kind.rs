//! Typed attribute input values.
//!
//! Raw form input arrives as text. `TypedValue::parse` turns it into the
//! representation stored in the column chosen by the definition type.

use crate::model::attribute::{DefinitionType, ValueColumn};
use crate::model::date_format::DateFormat;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid decimal regex"));

/// Canonical stored text of a checked checkbox.
pub const CHECKBOX_TRUE: &str = "1";
/// Canonical stored text of an unchecked checkbox.
pub const CHECKBOX_FALSE: &str = "0";

/// A value ready to be written to (or looked up in) `attribute_values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl TypedValue {
    /// Parses raw input for a definition type.
    ///
    /// Returns `None` when the input is not a valid value of that type.
    pub fn parse(raw: &str, definition_type: DefinitionType, dates: &DateFormat) -> Option<Self> {
        match definition_type.value_column() {
            ValueColumn::Text => Some(Self::Text(raw.to_string())),
            ValueColumn::Decimal => parse_decimal(raw).map(Self::Decimal),
            ValueColumn::Date => dates.parse(raw).map(Self::Date),
        }
    }

    pub fn column(&self) -> ValueColumn {
        match self {
            Self::Text(_) => ValueColumn::Text,
            Self::Decimal(_) => ValueColumn::Decimal,
            Self::Date(_) => ValueColumn::Date,
        }
    }

    /// Value as stored in its column.
    pub fn storage_text(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Decimal(value) => value.normalize().to_string(),
            Self::Date(value) => value.format(super::date_format::STORAGE_DATE_FORMAT).to_string(),
        }
    }
}

/// Strict decimal parsing: optional minus sign, digits, optional fraction.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if !DECIMAL_RE.is_match(trimmed) {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

/// Whether a text value counts as an unchecked checkbox.
pub fn is_falsy_checkbox_text(value: Option<&str>) -> bool {
    matches!(value, None | Some("") | Some("0") | Some("FALSE"))
}
