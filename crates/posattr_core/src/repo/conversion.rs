//! Type conversion engine for attribute definitions.
//!
//! # Responsibility
//! - Decide, per (from, to) type pair, how existing values are migrated.
//! - Rewrite `attribute_values`/`attribute_links` for a definition whose
//!   type changed, then sweep orphaned links and values.
//!
//! # Invariants
//! - Validation of every affected value happens before the first write.
//! - Callers run the engine inside the transaction that updates the
//!   definition row, so any error leaves the database untouched.
//! - After a CHECKBOX conversion every link of the definition points at the
//!   canonical `"0"` or `"1"` value row.

use crate::model::attribute::{AttributeId, DefinitionId, DefinitionType, ItemId};
use crate::model::date_format::DateFormat;
use crate::model::value_kind::{TypedValue, CHECKBOX_FALSE, CHECKBOX_TRUE};
use crate::repo::value_repo::{
    delete_orphaned_links_for, delete_orphaned_values_in, ensure_anchor_link,
    find_or_insert_value, items_by_value,
};
use crate::repo::RepoResult;
use log::{error, info};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How values are migrated for one type change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPlan {
    /// Values are reinterpreted under the new type without rewriting.
    NoOp,
    /// Text values are parsed into the DATE or DECIMAL column.
    Retype,
    /// DATE or DECIMAL values are rendered back to text.
    Render,
    /// Links are repointed at the canonical `"0"`/`"1"` values.
    Checkbox,
}

impl ConversionPlan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoOp => "noop",
            Self::Retype => "retype",
            Self::Render => "render",
            Self::Checkbox => "checkbox",
        }
    }
}

/// Result of a completed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub plan: ConversionPlan,
    /// Link rows repointed at a different value row.
    pub rewritten_links: usize,
    pub swept_links: usize,
    pub swept_values: usize,
}

/// Why a definition type change was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// No conversion exists between the two types.
    Unsupported {
        from: DefinitionType,
        to: DefinitionType,
    },
    /// A stored value cannot be represented under the target type.
    InvalidValue {
        value: Option<String>,
        to: DefinitionType,
        affected_items: Vec<ItemId>,
    },
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported { from, to } => {
                write!(f, "cannot convert attribute definition from {from} to {to}")
            }
            Self::InvalidValue {
                value,
                to,
                affected_items,
            } => write!(
                f,
                "attribute value `{}` cannot be converted to {to}; affected items: {}",
                value.as_deref().unwrap_or("NULL"),
                join_ids(affected_items)
            ),
        }
    }
}

impl Error for ConversionError {}

/// Conversion matrix.
pub fn plan_conversion(
    from: DefinitionType,
    to: DefinitionType,
) -> Result<ConversionPlan, ConversionError> {
    use DefinitionType::{Checkbox, Date, Decimal, Dropdown, Group, Text};

    match (from, to) {
        (from, to) if from == to => Ok(ConversionPlan::NoOp),
        (_, Group) => Err(ConversionError::Unsupported { from, to }),
        (Group, _) => Ok(ConversionPlan::NoOp),
        (Text, Date | Decimal) => Ok(ConversionPlan::Retype),
        (Text | Dropdown, Checkbox) => Ok(ConversionPlan::Checkbox),
        (Text, Dropdown) | (Dropdown, Text) | (Checkbox, Text | Dropdown) => {
            Ok(ConversionPlan::NoOp)
        }
        (Date | Decimal, Text | Dropdown) => Ok(ConversionPlan::Render),
        _ => Err(ConversionError::Unsupported { from, to }),
    }
}

/// Migrates the values of `definition_id` from `from` to `to` and sweeps
/// orphans.
///
/// Must run on a connection inside an open transaction.
pub(crate) fn convert_definition_data(
    conn: &Connection,
    definition_id: DefinitionId,
    from: DefinitionType,
    to: DefinitionType,
    dates: &DateFormat,
) -> RepoResult<ConversionOutcome> {
    let plan = plan_conversion(from, to)?;

    let rewritten_links = match plan {
        ConversionPlan::NoOp => 0,
        ConversionPlan::Retype => {
            let targets = validate_text_values(conn, definition_id, to, dates)?;
            repoint_links(conn, definition_id, &targets)?
        }
        ConversionPlan::Render => {
            let targets = render_values(conn, definition_id, from, dates)?;
            repoint_links(conn, definition_id, &targets)?
        }
        ConversionPlan::Checkbox => rewrite_checkbox_links(conn, definition_id)?,
    };

    let swept_links = delete_orphaned_links_for(conn, definition_id, to)?;
    if plan == ConversionPlan::Checkbox {
        anchor_checkbox_values(conn, definition_id)?;
    }
    let swept_values = delete_orphaned_values_in(conn)?;

    info!(
        "event=definition_convert module=repo status=ok definition_id={definition_id} from={from} to={to} plan={} rewritten_links={rewritten_links}",
        plan.as_str()
    );

    Ok(ConversionOutcome {
        plan,
        rewritten_links,
        swept_links,
        swept_values,
    })
}

/// Distinct (attribute_id, attribute_value) pairs linked to a definition.
fn linked_text_values(
    conn: &Connection,
    definition_id: DefinitionId,
) -> RepoResult<Vec<(AttributeId, Option<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT v.attribute_id, v.attribute_value
         FROM attribute_values v
         INNER JOIN attribute_links l ON l.attribute_id = v.attribute_id
         WHERE l.definition_id = ?1
         ORDER BY v.attribute_id ASC;",
    )?;
    let rows = stmt.query_map([definition_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Parses every linked text value under `to`; fails on the first value that
/// does not parse, before anything is written.
fn validate_text_values(
    conn: &Connection,
    definition_id: DefinitionId,
    to: DefinitionType,
    dates: &DateFormat,
) -> RepoResult<Vec<(AttributeId, TypedValue)>> {
    let mut targets = Vec::new();
    for (attribute_id, text) in linked_text_values(conn, definition_id)? {
        let parsed = text
            .as_deref()
            .and_then(|value| TypedValue::parse(value, to, dates));
        match parsed {
            Some(value) => targets.push((attribute_id, value)),
            None => {
                let affected_items = items_by_value(conn, text.as_deref(), definition_id)?;
                error!(
                    "event=definition_convert module=repo status=error definition_id={definition_id} to={to} value={:?} affected_items={}",
                    text.as_deref().unwrap_or("NULL"),
                    join_ids(&affected_items)
                );
                return Err(ConversionError::InvalidValue {
                    value: text,
                    to,
                    affected_items,
                }
                .into());
            }
        }
    }
    Ok(targets)
}

fn render_values(
    conn: &Connection,
    definition_id: DefinitionId,
    from: DefinitionType,
    dates: &DateFormat,
) -> RepoResult<Vec<(AttributeId, TypedValue)>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT v.attribute_id, v.attribute_decimal, v.attribute_date
         FROM attribute_values v
         INNER JOIN attribute_links l ON l.attribute_id = v.attribute_id
         WHERE l.definition_id = ?1
         ORDER BY v.attribute_id ASC;",
    )?;
    let mut rows = stmt.query([definition_id])?;
    let mut targets = Vec::new();
    while let Some(row) = rows.next()? {
        let attribute_id: AttributeId = row.get(0)?;
        let rendered = match from {
            DefinitionType::Decimal => row.get::<_, Option<String>>(1)?,
            DefinitionType::Date => row
                .get::<_, Option<chrono::NaiveDate>>(2)?
                .map(|date| dates.render(date)),
            _ => None,
        };
        if let Some(text) = rendered {
            targets.push((attribute_id, TypedValue::Text(text)));
        }
    }
    Ok(targets)
}

/// Points every link of the definition that references an old value row at
/// the row holding its converted value.
fn repoint_links(
    conn: &Connection,
    definition_id: DefinitionId,
    targets: &[(AttributeId, TypedValue)],
) -> RepoResult<usize> {
    let mut rewritten = 0;
    for (old_id, value) in targets {
        let new_id = find_or_insert_value(conn, value)?;
        if new_id == *old_id {
            continue;
        }
        rewritten += conn.execute(
            "UPDATE attribute_links
             SET attribute_id = ?3
             WHERE definition_id = ?1
               AND attribute_id = ?2;",
            params![definition_id, old_id, new_id],
        )?;
    }
    Ok(rewritten)
}

fn canonical_checkbox_values(conn: &Connection) -> RepoResult<(AttributeId, AttributeId)> {
    let unchecked = find_or_insert_value(conn, &TypedValue::Text(CHECKBOX_FALSE.to_string()))?;
    let checked = find_or_insert_value(conn, &TypedValue::Text(CHECKBOX_TRUE.to_string()))?;
    Ok((unchecked, checked))
}

/// Repoints every link of the definition at the canonical unchecked or
/// checked value. Falsy text (`NULL`, empty, `"0"`, `"FALSE"`) maps to
/// unchecked.
fn rewrite_checkbox_links(conn: &Connection, definition_id: DefinitionId) -> RepoResult<usize> {
    let (unchecked, checked) = canonical_checkbox_values(conn)?;
    let rewritten = conn.execute(
        "UPDATE attribute_links
         SET attribute_id = CASE
            WHEN COALESCE(
                (SELECT v.attribute_value
                 FROM attribute_values v
                 WHERE v.attribute_id = attribute_links.attribute_id),
                ''
            ) IN ('FALSE', '0', '') THEN ?2
            ELSE ?3
         END
         WHERE definition_id = ?1;",
        params![definition_id, unchecked, checked],
    )?;
    Ok(rewritten)
}

fn anchor_checkbox_values(conn: &Connection, definition_id: DefinitionId) -> RepoResult<()> {
    let (unchecked, checked) = canonical_checkbox_values(conn)?;
    ensure_anchor_link(conn, definition_id, unchecked)?;
    ensure_anchor_link(conn, definition_id, checked)?;
    Ok(())
}

fn join_ids(ids: &[ItemId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::{plan_conversion, ConversionError, ConversionPlan};
    use crate::model::attribute::DefinitionType::{
        Checkbox, Date, Decimal, Dropdown, Group, Text,
    };

    #[test]
    fn text_conversions_follow_matrix() {
        assert_eq!(plan_conversion(Text, Date), Ok(ConversionPlan::Retype));
        assert_eq!(plan_conversion(Text, Decimal), Ok(ConversionPlan::Retype));
        assert_eq!(plan_conversion(Text, Dropdown), Ok(ConversionPlan::NoOp));
        assert_eq!(plan_conversion(Text, Checkbox), Ok(ConversionPlan::Checkbox));
        assert_eq!(
            plan_conversion(Text, Group),
            Err(ConversionError::Unsupported {
                from: Text,
                to: Group
            })
        );
    }

    #[test]
    fn dropdown_and_typed_conversions_follow_matrix() {
        assert_eq!(plan_conversion(Dropdown, Checkbox), Ok(ConversionPlan::Checkbox));
        assert_eq!(plan_conversion(Dropdown, Text), Ok(ConversionPlan::NoOp));
        assert!(plan_conversion(Dropdown, Date).is_err());
        assert_eq!(plan_conversion(Date, Text), Ok(ConversionPlan::Render));
        assert_eq!(plan_conversion(Decimal, Dropdown), Ok(ConversionPlan::Render));
        assert!(plan_conversion(Date, Decimal).is_err());
        assert!(plan_conversion(Checkbox, Date).is_err());
        assert_eq!(plan_conversion(Group, Text), Ok(ConversionPlan::NoOp));
    }

    #[test]
    fn same_type_is_noop() {
        assert_eq!(plan_conversion(Date, Date), Ok(ConversionPlan::NoOp));
    }

    #[test]
    fn invalid_value_error_lists_items() {
        let err = ConversionError::InvalidValue {
            value: Some("blue".to_string()),
            to: Date,
            affected_items: vec![3, 7],
        };
        assert_eq!(
            err.to_string(),
            "attribute value `blue` cannot be converted to DATE; affected items: 3,7"
        );
    }
}
