//! Attribute definition, value and link records.
//!
//! # Responsibility
//! - Mirror the `attribute_definitions`, `attribute_values` and
//!   `attribute_links` rows as typed structs.
//! - Provide the definition type enum, the visibility flag bitmask and the
//!   link scope used to address item/sale/receiving contexts.
//!
//! # Invariants
//! - A link addresses at most one of sale or receiving.
//! - GROUP definitions never own values.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::BitOr;

pub type DefinitionId = i64;
pub type AttributeId = i64;
pub type ItemId = i64;
pub type SaleId = i64;
pub type ReceivingId = i64;

/// Value type of an attribute definition.
///
/// Serialized with the upper-case names stored in `definition_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefinitionType {
    /// Free text stored in `attribute_value`.
    Text,
    /// Calendar date stored in `attribute_date`.
    Date,
    /// Decimal number stored in `attribute_decimal`.
    Decimal,
    /// One of a fixed set of text options anchored on the definition.
    Dropdown,
    /// Boolean stored as the canonical text values `"0"` / `"1"`.
    Checkbox,
    /// Container for child definitions; owns no values.
    Group,
}

impl DefinitionType {
    pub const ALL: [DefinitionType; 6] = [
        DefinitionType::Text,
        DefinitionType::Date,
        DefinitionType::Decimal,
        DefinitionType::Dropdown,
        DefinitionType::Checkbox,
        DefinitionType::Group,
    ];

    /// Database representation in `attribute_definitions.definition_type`.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Decimal => "DECIMAL",
            Self::Dropdown => "DROPDOWN",
            Self::Checkbox => "CHECKBOX",
            Self::Group => "GROUP",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "TEXT" => Some(Self::Text),
            "DATE" => Some(Self::Date),
            "DECIMAL" => Some(Self::Decimal),
            "DROPDOWN" => Some(Self::Dropdown),
            "CHECKBOX" => Some(Self::Checkbox),
            "GROUP" => Some(Self::Group),
            _ => None,
        }
    }

    /// `attribute_values` column holding values of this type.
    pub fn value_column(self) -> ValueColumn {
        match self {
            Self::Date => ValueColumn::Date,
            Self::Decimal => ValueColumn::Decimal,
            Self::Text | Self::Dropdown | Self::Checkbox | Self::Group => ValueColumn::Text,
        }
    }
}

impl Display for DefinitionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Storage column of `attribute_values`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueColumn {
    Text,
    Decimal,
    Date,
}

impl ValueColumn {
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "attribute_value",
            Self::Decimal => "attribute_decimal",
            Self::Date => "attribute_date",
        }
    }
}

/// Visibility bitmask stored in `definition_flags`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionFlags(u32);

impl DefinitionFlags {
    pub const NONE: DefinitionFlags = DefinitionFlags(0);
    pub const SHOW_IN_ITEMS: DefinitionFlags = DefinitionFlags(1);
    pub const SHOW_IN_SALES: DefinitionFlags = DefinitionFlags(2);
    pub const SHOW_IN_RECEIVINGS: DefinitionFlags = DefinitionFlags(4);

    /// Named flag table, in bit order.
    pub const NAMED: [(&'static str, DefinitionFlags); 3] = [
        ("SHOW_IN_ITEMS", DefinitionFlags::SHOW_IN_ITEMS),
        ("SHOW_IN_SALES", DefinitionFlags::SHOW_IN_SALES),
        ("SHOW_IN_RECEIVINGS", DefinitionFlags::SHOW_IN_RECEIVINGS),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: DefinitionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the flags set in this mask.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for DefinitionFlags {
    type Output = DefinitionFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        DefinitionFlags(self.0 | rhs.0)
    }
}

/// Persisted attribute definition row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub definition_id: DefinitionId,
    pub definition_name: String,
    pub definition_type: DefinitionType,
    pub definition_flags: DefinitionFlags,
    /// Parent GROUP definition.
    pub definition_fk: Option<DefinitionId>,
    pub deleted: bool,
}

/// Write model for creating or updating a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionDraft {
    pub definition_name: String,
    pub definition_type: DefinitionType,
    pub definition_flags: DefinitionFlags,
    pub definition_fk: Option<DefinitionId>,
}

impl DefinitionDraft {
    pub fn new(name: impl Into<String>, definition_type: DefinitionType) -> Self {
        Self {
            definition_name: name.into(),
            definition_type,
            definition_flags: DefinitionFlags::NONE,
            definition_fk: None,
        }
    }

    pub fn with_flags(mut self, flags: DefinitionFlags) -> Self {
        self.definition_flags = flags;
        self
    }

    pub fn with_parent(mut self, parent: DefinitionId) -> Self {
        self.definition_fk = Some(parent);
        self
    }
}

/// Definition joined with its parent group name.
///
/// `Default` is the blank placeholder rendered when a lookup finds nothing:
/// no id, empty name, TEXT type, no flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionDetail {
    pub definition_id: Option<DefinitionId>,
    pub definition_name: String,
    pub definition_type: DefinitionType,
    pub definition_flags: DefinitionFlags,
    pub definition_fk: Option<DefinitionId>,
    pub definition_group: Option<String>,
    pub deleted: bool,
}

impl Default for DefinitionDetail {
    fn default() -> Self {
        Self {
            definition_id: None,
            definition_name: String::new(),
            definition_type: DefinitionType::Text,
            definition_flags: DefinitionFlags::NONE,
            definition_fk: None,
            definition_group: None,
            deleted: false,
        }
    }
}

impl DefinitionDetail {
    pub fn is_placeholder(&self) -> bool {
        self.definition_id.is_none()
    }
}

/// Id/name pair used by select boxes and flag/type listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionName {
    pub definition_id: DefinitionId,
    pub definition_name: String,
}

/// Persisted attribute value row. Exactly one column is meaningful,
/// chosen by the owning definition's type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub attribute_id: AttributeId,
    pub attribute_value: Option<String>,
    pub attribute_decimal: Option<Decimal>,
    pub attribute_date: Option<NaiveDate>,
}

/// Persisted attribute link row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeLink {
    pub attribute_id: Option<AttributeId>,
    pub definition_id: DefinitionId,
    pub item_id: Option<ItemId>,
    pub sale_id: Option<SaleId>,
    pub receiving_id: Option<ReceivingId>,
}

impl AttributeLink {
    pub fn scope(&self) -> LinkScope {
        match (self.sale_id, self.receiving_id) {
            (Some(sale_id), _) => LinkScope::Sale(sale_id),
            (None, Some(receiving_id)) => LinkScope::Receiving(receiving_id),
            (None, None) => LinkScope::Item,
        }
    }
}

/// Context a link row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    /// Live attribute of an item (no sale/receiving reference).
    Item,
    /// Snapshot captured by a sale.
    Sale(SaleId),
    /// Snapshot captured by a receiving.
    Receiving(ReceivingId),
}

/// Transaction a snapshot of item attributes is copied onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotTarget {
    Sale(SaleId),
    Receiving(ReceivingId),
}

impl From<SnapshotTarget> for LinkScope {
    fn from(value: SnapshotTarget) -> Self {
        match value {
            SnapshotTarget::Sale(id) => LinkScope::Sale(id),
            SnapshotTarget::Receiving(id) => LinkScope::Receiving(id),
        }
    }
}

/// Definition joined with one item's item-scoped link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemAttribute {
    pub definition: AttributeDefinition,
    pub attribute_id: Option<AttributeId>,
    pub item_id: ItemId,
}

/// Value row seen through one link, as used by conversions and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedValue {
    pub definition_id: DefinitionId,
    pub attribute_id: AttributeId,
    pub item_id: Option<ItemId>,
    pub attribute_value: Option<String>,
    pub attribute_decimal: Option<Decimal>,
    pub attribute_date: Option<NaiveDate>,
}

/// Comma-joined rendering of an item's attributes in one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkValuesSummary {
    /// Text values joined with `", "`.
    pub attribute_values: Option<String>,
    /// Date values rendered with the configured date format, joined with `", "`.
    pub attribute_dtvalues: Option<String>,
}

/// Autocomplete entry: `value` is the attribute id, `label` the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub value: AttributeId,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::{AttributeLink, DefinitionFlags, DefinitionType, LinkScope, ValueColumn};

    #[test]
    fn definition_type_db_names_are_stable() {
        for kind in DefinitionType::ALL {
            assert_eq!(DefinitionType::from_db_str(kind.as_db_str()), Some(kind));
        }
        assert_eq!(DefinitionType::from_db_str("text"), None);
    }

    #[test]
    fn value_column_follows_type() {
        assert_eq!(DefinitionType::Date.value_column(), ValueColumn::Date);
        assert_eq!(DefinitionType::Decimal.value_column(), ValueColumn::Decimal);
        assert_eq!(DefinitionType::Checkbox.value_column(), ValueColumn::Text);
        assert_eq!(ValueColumn::Decimal.name(), "attribute_decimal");
    }

    #[test]
    fn flags_combine_and_name() {
        let flags = DefinitionFlags::SHOW_IN_ITEMS | DefinitionFlags::SHOW_IN_RECEIVINGS;
        assert_eq!(flags.bits(), 5);
        assert!(flags.contains(DefinitionFlags::SHOW_IN_ITEMS));
        assert!(!flags.contains(DefinitionFlags::SHOW_IN_SALES));
        assert_eq!(flags.names(), vec!["SHOW_IN_ITEMS", "SHOW_IN_RECEIVINGS"]);
    }

    #[test]
    fn link_scope_prefers_transaction_reference() {
        let link = AttributeLink {
            attribute_id: Some(1),
            definition_id: 2,
            item_id: Some(3),
            sale_id: Some(9),
            receiving_id: None,
        };
        assert_eq!(link.scope(), LinkScope::Sale(9));
    }

    #[test]
    fn definition_type_serializes_upper_case() {
        let json = serde_json::to_string(&DefinitionType::Checkbox).unwrap();
        assert_eq!(json, "\"CHECKBOX\"");
    }
}
