//! Attribute definition store.
//!
//! # Responsibility
//! - Create, update, soft-delete and undelete `attribute_definitions` rows.
//! - Run the type conversion engine when an update changes the type.
//! - Serve the search/list/lookup read models used by forms and tables.
//!
//! # Invariants
//! - Listing and search APIs never return soft-deleted definitions.
//! - A type change and its value conversion commit together or not at all.

use crate::model::attribute::{
    AttributeDefinition, AttributeId, DefinitionDetail, DefinitionDraft, DefinitionFlags, DefinitionId,
    DefinitionName, DefinitionType, ItemAttribute, ItemId,
};
use crate::model::value_kind::TypedValue;
use crate::repo::attribute_repo::SqliteAttributeRepository;
use crate::repo::config_repo::load_date_format;
use crate::repo::conversion::{convert_definition_data, ConversionOutcome};
use crate::repo::value_repo::{ensure_anchor_link, find_or_insert_value};
use crate::repo::{bool_to_int, int_to_bool, like_pattern, RepoError, RepoResult};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

const DEFINITION_SELECT_SQL: &str = "SELECT
    definition_id,
    definition_name,
    definition_type,
    definition_flags,
    definition_fk,
    deleted
FROM attribute_definitions";

const DETAIL_SELECT_SQL: &str = "SELECT
    parent.definition_name AS definition_group,
    definition.definition_id AS definition_id,
    definition.definition_name AS definition_name,
    definition.definition_type AS definition_type,
    definition.definition_flags AS definition_flags,
    definition.definition_fk AS definition_fk,
    definition.deleted AS deleted
FROM attribute_definitions definition
LEFT JOIN attribute_definitions parent ON parent.definition_id = definition.definition_fk";

const SEARCH_FILTER_SQL: &str = " WHERE definition.deleted = 0
   AND (
     definition.definition_name LIKE ?1 ESCAPE '\\'
     OR definition.definition_type LIKE ?1 ESCAPE '\\'
   )";

/// Sortable columns of the definition table view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefinitionSort {
    #[default]
    Name,
    Type,
    Flags,
    Group,
    Id,
}

impl DefinitionSort {
    fn column(self) -> &'static str {
        match self {
            Self::Name => "definition.definition_name",
            Self::Type => "definition.definition_type",
            Self::Flags => "definition.definition_flags",
            Self::Group => "parent.definition_name",
            Self::Id => "definition.definition_id",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Search options for the definition table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSearchQuery {
    /// Substring matched against name or type. Empty matches everything.
    pub search: String,
    /// Page size. `None` or `Some(0)` returns every match.
    pub limit: Option<u32>,
    pub offset: u32,
    pub sort: DefinitionSort,
    pub order: SortOrder,
}

impl DefinitionSearchQuery {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            ..Self::default()
        }
    }
}

/// Outcome of [`DefinitionRepository::save_definition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDefinition {
    pub definition_id: DefinitionId,
    pub action: SaveAction,
    /// Present when the update changed the definition type.
    pub conversion: Option<ConversionOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Inserted,
    Updated,
    Undeleted,
}

impl SaveAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "insert",
            Self::Updated => "update",
            Self::Undeleted => "undelete",
        }
    }
}

/// Repository interface for attribute definitions.
pub trait DefinitionRepository {
    /// Whether exactly one definition with this id and deleted state exists.
    fn exists(&self, definition_id: DefinitionId, deleted: bool) -> RepoResult<bool>;
    /// Inserts, updates or undeletes a definition.
    fn save_definition(
        &mut self,
        draft: &DefinitionDraft,
        definition_id: Option<DefinitionId>,
    ) -> RepoResult<SavedDefinition>;
    /// [`save_definition`](Self::save_definition) that also anchors DROPDOWN
    /// `options` in the same transaction. Blank options are skipped.
    fn save_definition_with_options(
        &mut self,
        draft: &DefinitionDraft,
        definition_id: Option<DefinitionId>,
        options: &[String],
    ) -> RepoResult<SavedDefinition>;
    /// Group-joined detail view; `None` when the id is unknown.
    fn get_info(&self, definition_id: DefinitionId) -> RepoResult<Option<DefinitionDetail>>;
    fn search(&self, query: &DefinitionSearchQuery) -> RepoResult<Vec<DefinitionDetail>>;
    /// Number of definitions `search` matches, ignoring paging.
    fn get_found_rows(&self, search: &str) -> RepoResult<u64>;
    /// Number of non-deleted definitions.
    fn get_total_rows(&self) -> RepoResult<u64>;
    fn get_definitions_by_flags(&self, flags: DefinitionFlags) -> RepoResult<Vec<DefinitionName>>;
    fn get_definitions_by_type(
        &self,
        definition_type: DefinitionType,
        exclude: Option<DefinitionId>,
    ) -> RepoResult<Vec<DefinitionName>>;
    fn get_definition_names(&self, include_groups: bool) -> RepoResult<Vec<DefinitionName>>;
    fn get_definition_by_name(
        &self,
        definition_name: &str,
        definition_type: Option<DefinitionType>,
    ) -> RepoResult<Vec<AttributeDefinition>>;
    /// Non-GROUP definitions listed in `definition_ids` or nested under a
    /// group listed there.
    fn get_values_by_definitions(
        &self,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<Vec<AttributeDefinition>>;
    /// Dropdown options anchored on a definition, ordered by value.
    fn get_definition_values(
        &self,
        definition_id: DefinitionId,
    ) -> RepoResult<Vec<(AttributeId, String)>>;
    /// Definitions an item has an item-scoped link for, ordered by name.
    fn get_attributes_by_item(&self, item_id: ItemId) -> RepoResult<Vec<ItemAttribute>>;
    fn delete_definition(&self, definition_id: DefinitionId) -> RepoResult<()>;
    /// Soft-deletes many definitions. Returns the number of rows flagged.
    fn delete_definition_list(&self, definition_ids: &[DefinitionId]) -> RepoResult<usize>;
    fn undelete(&self, definition_id: DefinitionId) -> RepoResult<()>;
}

impl DefinitionRepository for SqliteAttributeRepository<'_> {
    fn exists(&self, definition_id: DefinitionId, deleted: bool) -> RepoResult<bool> {
        definition_exists(self.connection(), definition_id, deleted)
    }

    fn save_definition(
        &mut self,
        draft: &DefinitionDraft,
        definition_id: Option<DefinitionId>,
    ) -> RepoResult<SavedDefinition> {
        self.save_definition_with_options(draft, definition_id, &[])
    }

    fn save_definition_with_options(
        &mut self,
        draft: &DefinitionDraft,
        definition_id: Option<DefinitionId>,
        options: &[String],
    ) -> RepoResult<SavedDefinition> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let active = match definition_id {
            Some(id) => definition_exists(&tx, id, false)?,
            None => false,
        };
        let soft_deleted = match definition_id {
            Some(id) if !active => definition_exists(&tx, id, true)?,
            _ => false,
        };

        let saved = match definition_id {
            Some(id) if active || soft_deleted => {
                let action = if soft_deleted {
                    tx.execute(
                        "UPDATE attribute_definitions SET deleted = 0 WHERE definition_id = ?1;",
                        [id],
                    )?;
                    SaveAction::Undeleted
                } else {
                    SaveAction::Updated
                };

                let from_type = definition_type_of(&tx, id)?.ok_or(RepoError::DefinitionNotFound(id))?;
                update_definition_row(&tx, id, draft)?;

                let conversion = if from_type != draft.definition_type {
                    let dates = load_date_format(&tx)?;
                    match convert_definition_data(&tx, id, from_type, draft.definition_type, &dates) {
                        Ok(outcome) => Some(outcome),
                        Err(err) => {
                            error!(
                                "event=definition_save module=repo status=error definition_id={id} from={from_type} to={} error={err}",
                                draft.definition_type
                            );
                            return Err(err);
                        }
                    }
                } else {
                    None
                };

                SavedDefinition {
                    definition_id: id,
                    action,
                    conversion,
                }
            }
            _ => SavedDefinition {
                definition_id: insert_definition_row(&tx, draft)?,
                action: SaveAction::Inserted,
                conversion: None,
            },
        };

        if draft.definition_type == DefinitionType::Dropdown {
            for option in options
                .iter()
                .map(|option| option.trim())
                .filter(|option| !option.is_empty())
            {
                let attribute_id = find_or_insert_value(&tx, &TypedValue::Text(option.to_string()))?;
                ensure_anchor_link(&tx, saved.definition_id, attribute_id)?;
            }
        }

        tx.commit()?;
        info!(
            "event=definition_save module=repo status=ok definition_id={} action={}",
            saved.definition_id,
            saved.action.as_str()
        );
        Ok(saved)
    }

    fn get_info(&self, definition_id: DefinitionId) -> RepoResult<Option<DefinitionDetail>> {
        let mut stmt = self.connection().prepare(&format!(
            "{DETAIL_SELECT_SQL} WHERE definition.definition_id = ?1;"
        ))?;
        let mut rows = stmt.query([definition_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_detail_row(row)?));
        }
        Ok(None)
    }

    fn search(&self, query: &DefinitionSearchQuery) -> RepoResult<Vec<DefinitionDetail>> {
        let mut sql = format!("{DETAIL_SELECT_SQL}{SEARCH_FILTER_SQL}");
        let mut bind_values: Vec<Value> = vec![Value::Text(like_pattern(&query.search))];

        sql.push_str(" ORDER BY ");
        sql.push_str(query.sort.column());
        sql.push(' ');
        sql.push_str(query.order.keyword());
        sql.push_str(", definition.definition_id ASC");

        match query.limit {
            Some(limit) if limit > 0 => {
                sql.push_str(" LIMIT ?2 OFFSET ?3");
                bind_values.push(Value::Integer(i64::from(limit)));
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
            _ if query.offset > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?2");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
            _ => {}
        }

        let mut stmt = self.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut definitions = Vec::new();
        while let Some(row) = rows.next()? {
            definitions.push(parse_detail_row(row)?);
        }
        Ok(definitions)
    }

    fn get_found_rows(&self, search: &str) -> RepoResult<u64> {
        let count: i64 = self.connection().query_row(
            &format!(
                "SELECT COUNT(*)
                 FROM attribute_definitions definition{SEARCH_FILTER_SQL};"
            ),
            [like_pattern(search)],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_total_rows(&self) -> RepoResult<u64> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM attribute_definitions WHERE deleted = 0;",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_definitions_by_flags(&self, flags: DefinitionFlags) -> RepoResult<Vec<DefinitionName>> {
        let mut stmt = self.connection().prepare(
            "SELECT definition_id, definition_name
             FROM attribute_definitions
             WHERE (definition_flags & ?1) <> 0
               AND deleted = 0
               AND definition_type <> 'GROUP'
             ORDER BY definition_id ASC;",
        )?;
        let rows = stmt.query_map([i64::from(flags.bits())], parse_name_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_definitions_by_type(
        &self,
        definition_type: DefinitionType,
        exclude: Option<DefinitionId>,
    ) -> RepoResult<Vec<DefinitionName>> {
        let mut stmt = self.connection().prepare(
            "SELECT definition_id, definition_name
             FROM attribute_definitions
             WHERE definition_type = ?1
               AND deleted = 0
               AND definition_fk IS NULL
               AND (?2 IS NULL OR definition_id <> ?2)
             ORDER BY definition_id ASC;",
        )?;
        let rows = stmt.query_map(
            params![definition_type.as_db_str(), exclude],
            parse_name_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_definition_names(&self, include_groups: bool) -> RepoResult<Vec<DefinitionName>> {
        let mut stmt = self.connection().prepare(
            "SELECT definition_id, definition_name
             FROM attribute_definitions
             WHERE deleted = 0
               AND (?1 = 1 OR definition_type <> 'GROUP')
             ORDER BY definition_name ASC, definition_id ASC;",
        )?;
        let rows = stmt.query_map([bool_to_int(include_groups)], parse_name_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_definition_by_name(
        &self,
        definition_name: &str,
        definition_type: Option<DefinitionType>,
    ) -> RepoResult<Vec<AttributeDefinition>> {
        let mut stmt = self.connection().prepare(&format!(
            "{DEFINITION_SELECT_SQL}
             WHERE definition_name = ?1
               AND (?2 IS NULL OR definition_type = ?2)
             ORDER BY definition_id ASC;"
        ))?;
        let mut rows = stmt.query(params![
            definition_name,
            definition_type.map(DefinitionType::as_db_str)
        ])?;
        let mut definitions = Vec::new();
        while let Some(row) = rows.next()? {
            definitions.push(parse_definition_row(row)?);
        }
        Ok(definitions)
    }

    fn get_values_by_definitions(
        &self,
        definition_ids: &[DefinitionId],
    ) -> RepoResult<Vec<AttributeDefinition>> {
        if definition_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; definition_ids.len()].join(", ");
        let sql = format!(
            "{DEFINITION_SELECT_SQL}
             WHERE (definition_fk IN ({placeholders}) OR definition_id IN ({placeholders}))
               AND definition_type <> 'GROUP'
               AND deleted = 0
             ORDER BY definition_id ASC;"
        );
        let bind_values = definition_ids
            .iter()
            .chain(definition_ids.iter())
            .copied()
            .map(Value::Integer);

        let mut stmt = self.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut definitions = Vec::new();
        while let Some(row) = rows.next()? {
            definitions.push(parse_definition_row(row)?);
        }
        Ok(definitions)
    }

    fn get_definition_values(
        &self,
        definition_id: DefinitionId,
    ) -> RepoResult<Vec<(AttributeId, String)>> {
        let mut stmt = self.connection().prepare(
            "SELECT v.attribute_id, v.attribute_value
             FROM attribute_links l
             INNER JOIN attribute_values v ON v.attribute_id = l.attribute_id
             WHERE l.definition_id = ?1
               AND l.item_id IS NULL
               AND l.sale_id IS NULL
               AND l.receiving_id IS NULL
               AND v.attribute_value IS NOT NULL
             ORDER BY v.attribute_value ASC, v.attribute_id ASC;",
        )?;
        let rows = stmt.query_map([definition_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_attributes_by_item(&self, item_id: ItemId) -> RepoResult<Vec<ItemAttribute>> {
        let mut stmt = self.connection().prepare(
            "SELECT
                d.definition_id AS definition_id,
                d.definition_name AS definition_name,
                d.definition_type AS definition_type,
                d.definition_flags AS definition_flags,
                d.definition_fk AS definition_fk,
                d.deleted AS deleted,
                l.attribute_id AS attribute_id
             FROM attribute_definitions d
             INNER JOIN attribute_links l ON l.definition_id = d.definition_id
             WHERE l.item_id = ?1
               AND l.sale_id IS NULL
               AND l.receiving_id IS NULL
               AND d.deleted = 0
             ORDER BY d.definition_name ASC, d.definition_id ASC;",
        )?;
        let mut rows = stmt.query([item_id])?;
        let mut attributes = Vec::new();
        while let Some(row) = rows.next()? {
            attributes.push(ItemAttribute {
                definition: parse_definition_row(row)?,
                attribute_id: row.get("attribute_id")?,
                item_id,
            });
        }
        Ok(attributes)
    }

    fn delete_definition(&self, definition_id: DefinitionId) -> RepoResult<()> {
        let changed = self.connection().execute(
            "UPDATE attribute_definitions SET deleted = 1 WHERE definition_id = ?1;",
            [definition_id],
        )?;
        if changed == 0 {
            return Err(RepoError::DefinitionNotFound(definition_id));
        }
        info!("event=definition_delete module=repo status=ok definition_id={definition_id}");
        Ok(())
    }

    fn delete_definition_list(&self, definition_ids: &[DefinitionId]) -> RepoResult<usize> {
        if definition_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; definition_ids.len()].join(", ");
        let changed = self.connection().execute(
            &format!(
                "UPDATE attribute_definitions
                 SET deleted = 1
                 WHERE definition_id IN ({placeholders});"
            ),
            params_from_iter(definition_ids.iter()),
        )?;
        info!(
            "event=definition_delete module=repo status=ok requested={} flagged={changed}",
            definition_ids.len()
        );
        Ok(changed)
    }

    fn undelete(&self, definition_id: DefinitionId) -> RepoResult<()> {
        let changed = self.connection().execute(
            "UPDATE attribute_definitions SET deleted = 0 WHERE definition_id = ?1;",
            [definition_id],
        )?;
        if changed == 0 {
            return Err(RepoError::DefinitionNotFound(definition_id));
        }
        Ok(())
    }
}

/// Flag name/bit table offered by definition forms.
pub fn definition_flag_names() -> &'static [(&'static str, DefinitionFlags)] {
    &DefinitionFlags::NAMED
}

pub(crate) fn definition_exists(
    conn: &Connection,
    definition_id: DefinitionId,
    deleted: bool,
) -> RepoResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM attribute_definitions
         WHERE definition_id = ?1
           AND deleted = ?2;",
        params![definition_id, bool_to_int(deleted)],
        |row| row.get(0),
    )?;
    Ok(count == 1)
}

/// Type of a definition regardless of its deleted state.
pub(crate) fn definition_type_of(
    conn: &Connection,
    definition_id: DefinitionId,
) -> RepoResult<Option<DefinitionType>> {
    let type_text: Option<String> = conn
        .query_row(
            "SELECT definition_type FROM attribute_definitions WHERE definition_id = ?1;",
            [definition_id],
            |row| row.get(0),
        )
        .optional()?;
    type_text
        .map(|value| parse_definition_type(&value))
        .transpose()
}

pub(crate) fn ensure_active_definition(
    conn: &Connection,
    definition_id: DefinitionId,
) -> RepoResult<()> {
    if definition_exists(conn, definition_id, false)? {
        Ok(())
    } else {
        Err(RepoError::DefinitionNotFound(definition_id))
    }
}

/// Active definition that may own values and links.
pub(crate) fn ensure_value_definition(
    conn: &Connection,
    definition_id: DefinitionId,
) -> RepoResult<()> {
    ensure_active_definition(conn, definition_id)?;
    match definition_type_of(conn, definition_id)? {
        Some(DefinitionType::Group) => Err(RepoError::GroupDefinition(definition_id)),
        _ => Ok(()),
    }
}

fn insert_definition_row(conn: &Connection, draft: &DefinitionDraft) -> RepoResult<DefinitionId> {
    conn.execute(
        "INSERT INTO attribute_definitions (
            definition_name,
            definition_type,
            definition_flags,
            definition_fk,
            deleted
        ) VALUES (?1, ?2, ?3, ?4, 0);",
        params![
            draft.definition_name.as_str(),
            draft.definition_type.as_db_str(),
            i64::from(draft.definition_flags.bits()),
            draft.definition_fk,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_definition_row(
    conn: &Connection,
    definition_id: DefinitionId,
    draft: &DefinitionDraft,
) -> RepoResult<()> {
    conn.execute(
        "UPDATE attribute_definitions
         SET
            definition_name = ?2,
            definition_type = ?3,
            definition_flags = ?4,
            definition_fk = ?5
         WHERE definition_id = ?1;",
        params![
            definition_id,
            draft.definition_name.as_str(),
            draft.definition_type.as_db_str(),
            i64::from(draft.definition_flags.bits()),
            draft.definition_fk,
        ],
    )?;
    Ok(())
}

fn parse_definition_type(value: &str) -> RepoResult<DefinitionType> {
    DefinitionType::from_db_str(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid definition type `{value}` in attribute_definitions.definition_type"
        ))
    })
}

fn parse_flags(value: i64) -> RepoResult<DefinitionFlags> {
    u32::try_from(value)
        .map(DefinitionFlags::from_bits)
        .map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid flags `{value}` in attribute_definitions.definition_flags"
            ))
        })
}

fn parse_definition_row(row: &Row<'_>) -> RepoResult<AttributeDefinition> {
    let type_text: String = row.get("definition_type")?;
    Ok(AttributeDefinition {
        definition_id: row.get("definition_id")?,
        definition_name: row.get("definition_name")?,
        definition_type: parse_definition_type(&type_text)?,
        definition_flags: parse_flags(row.get("definition_flags")?)?,
        definition_fk: row.get("definition_fk")?,
        deleted: int_to_bool(row.get("deleted")?, "attribute_definitions.deleted")?,
    })
}

fn parse_detail_row(row: &Row<'_>) -> RepoResult<DefinitionDetail> {
    let definition = parse_definition_row(row)?;
    Ok(DefinitionDetail {
        definition_id: Some(definition.definition_id),
        definition_name: definition.definition_name,
        definition_type: definition.definition_type,
        definition_flags: definition.definition_flags,
        definition_fk: definition.definition_fk,
        definition_group: row.get("definition_group")?,
        deleted: definition.deleted,
    })
}

fn parse_name_row(row: &Row<'_>) -> rusqlite::Result<DefinitionName> {
    Ok(DefinitionName {
        definition_id: row.get("definition_id")?,
        definition_name: row.get("definition_name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{definition_flag_names, DefinitionSort, SortOrder};
    use crate::model::attribute::DefinitionFlags;

    #[test]
    fn flag_table_lists_bits_in_order() {
        let bits: Vec<u32> = definition_flag_names()
            .iter()
            .map(|(_, flag)| flag.bits())
            .collect();
        assert_eq!(bits, vec![1, 2, 4]);
        assert_eq!(definition_flag_names()[1].0, "SHOW_IN_SALES");
        assert_eq!(definition_flag_names()[2].1, DefinitionFlags::SHOW_IN_RECEIVINGS);
    }

    #[test]
    fn sort_columns_are_qualified() {
        assert_eq!(DefinitionSort::default().column(), "definition.definition_name");
        assert_eq!(DefinitionSort::Group.column(), "parent.definition_name");
        assert_eq!(SortOrder::Desc.keyword(), "DESC");
    }
}
