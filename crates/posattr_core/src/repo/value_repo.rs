//! Attribute value and link persistence.
//!
//! # Responsibility
//! - Find, create and update `attribute_values` rows in the column chosen by
//!   the definition type.
//! - Maintain `attribute_links` in item, sale and receiving scope.
//! - Provide the denormalized read helpers used for rendering and
//!   autocomplete.
//! - Sweep orphaned links and values.
//!
//! # Invariants
//! - At most one item-scoped link exists per (item_id, definition_id).
//! - Links are only written for non-deleted definitions.
//! - A value row is never deleted while a link references it.

use crate::model::attribute::{
    AttributeId, AttributeLink, AttributeValue, DefinitionFlags, DefinitionId, DefinitionType,
    ItemId, LinkScope, LinkValuesSummary, LinkedValue, SnapshotTarget, Suggestion, ValueColumn,
};
use crate::model::date_format::DateFormat;
use crate::model::value_kind::TypedValue;
use crate::repo::attribute_repo::SqliteAttributeRepository;
use crate::repo::config_repo::load_date_format;
use crate::repo::definition_repo::{definition_type_of, ensure_value_definition};
use crate::repo::{like_pattern, RepoError, RepoResult};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

const LINKED_VALUE_SELECT_SQL: &str = "SELECT
    l.definition_id AS definition_id,
    l.attribute_id AS attribute_id,
    l.item_id AS item_id,
    v.attribute_value AS attribute_value,
    v.attribute_decimal AS attribute_decimal,
    v.attribute_date AS attribute_date
FROM attribute_links l
INNER JOIN attribute_values v ON v.attribute_id = l.attribute_id";

/// Repository interface for attribute values and links.
pub trait ValueRepository {
    /// Returns the id of the value row equal to `value` under `definition_type`.
    ///
    /// Date input is read with the configured date format.
    fn value_exists(
        &self,
        value: &str,
        definition_type: DefinitionType,
    ) -> RepoResult<Option<AttributeId>>;
    /// Stores a value for a definition and links it.
    ///
    /// With both `item_id` and `attribute_id` the item's existing value is
    /// replaced; otherwise a value row is reused or created and linked to the
    /// item (or anchored on the definition when `item_id` is `None`).
    fn save_value(
        &mut self,
        value: &str,
        definition_id: DefinitionId,
        item_id: Option<ItemId>,
        attribute_id: Option<AttributeId>,
        definition_type: DefinitionType,
    ) -> RepoResult<AttributeId>;
    /// Upserts the item-scoped link for (item_id, definition_id).
    fn save_link(
        &mut self,
        item_id: ItemId,
        definition_id: DefinitionId,
        attribute_id: AttributeId,
    ) -> RepoResult<()>;
    /// Whether the item has an item-scoped link (for one definition, or any
    /// valued link when `definition_id` is `None`).
    fn link_exists(&self, item_id: ItemId, definition_id: Option<DefinitionId>)
        -> RepoResult<bool>;
    /// Deletes item-scoped links of an item. Returns the number removed.
    fn delete_link(&self, item_id: ItemId, definition_id: Option<DefinitionId>)
        -> RepoResult<usize>;
    /// Deletes the links of a definition pointing at a text value, and the
    /// value rows left unreferenced. Returns the number of links removed.
    fn delete_value(&mut self, value: &str, definition_id: DefinitionId) -> RepoResult<usize>;
    /// Copies an item's item-scoped links into a sale or receiving snapshot.
    fn copy_attribute_links(&self, item_id: ItemId, target: SnapshotTarget) -> RepoResult<usize>;
    /// Item-scoped link row for (item_id, definition_id).
    fn get_link_value(
        &self,
        item_id: ItemId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<AttributeLink>>;
    /// Joined text and date values of an item in one scope, restricted to
    /// visible definitions matching `flags`.
    fn get_link_values(
        &self,
        item_id: ItemId,
        scope: LinkScope,
        flags: DefinitionFlags,
    ) -> RepoResult<LinkValuesSummary>;
    /// Item-scoped value row for (item_id, definition_id).
    fn get_attribute_value(
        &self,
        item_id: ItemId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<AttributeValue>>;
    /// Every item-scoped value of an item, ordered by definition id.
    fn get_attribute_values(&self, item_id: ItemId) -> RepoResult<Vec<LinkedValue>>;
    /// Every link of a definition with its value, in any scope.
    fn get_attributes_by_definition(
        &self,
        definition_id: DefinitionId,
    ) -> RepoResult<Vec<LinkedValue>>;
    /// Distinct text values of a definition containing `term`.
    fn get_suggestions(&self, definition_id: DefinitionId, term: &str)
        -> RepoResult<Vec<Suggestion>>;
    /// Deletes anchor links of a non-DROPDOWN definition. Returns the number removed.
    fn delete_orphaned_links(&self, definition_id: DefinitionId) -> RepoResult<usize>;
    /// Deletes values no link references. Returns the number removed.
    fn delete_orphaned_values(&self) -> RepoResult<usize>;
}

impl ValueRepository for SqliteAttributeRepository<'_> {
    fn value_exists(
        &self,
        value: &str,
        definition_type: DefinitionType,
    ) -> RepoResult<Option<AttributeId>> {
        let dates = load_date_format(self.connection())?;
        let typed = parse_typed_value(value, definition_type, &dates)?;
        find_value(self.connection(), &typed)
    }

    fn save_value(
        &mut self,
        value: &str,
        definition_id: DefinitionId,
        item_id: Option<ItemId>,
        attribute_id: Option<AttributeId>,
        definition_type: DefinitionType,
    ) -> RepoResult<AttributeId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_value_definition(&tx, definition_id)?;
        let dates = load_date_format(&tx)?;
        let typed = parse_typed_value(value, definition_type, &dates)?;

        let saved_id = match (item_id, attribute_id) {
            (Some(item_id), Some(attribute_id)) => {
                replace_item_value(&tx, item_id, definition_id, attribute_id, &typed)?
            }
            (Some(item_id), None) => {
                let attribute_id = find_or_insert_value(&tx, &typed)?;
                upsert_item_link(&tx, item_id, definition_id, attribute_id)?;
                attribute_id
            }
            (None, _) => {
                let attribute_id = find_or_insert_value(&tx, &typed)?;
                ensure_anchor_link(&tx, definition_id, attribute_id)?;
                attribute_id
            }
        };

        tx.commit()?;
        debug!(
            "event=value_save module=repo status=ok definition_id={definition_id} attribute_id={saved_id} column={}",
            typed.column().name()
        );
        Ok(saved_id)
    }

    fn save_link(
        &mut self,
        item_id: ItemId,
        definition_id: DefinitionId,
        attribute_id: AttributeId,
    ) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_value_definition(&tx, definition_id)?;
        upsert_item_link(&tx, item_id, definition_id, attribute_id)?;
        tx.commit()?;
        Ok(())
    }

    fn link_exists(
        &self,
        item_id: ItemId,
        definition_id: Option<DefinitionId>,
    ) -> RepoResult<bool> {
        let exists: i64 = match definition_id {
            Some(definition_id) => self.connection().query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM attribute_links
                    WHERE item_id = ?1
                      AND definition_id = ?2
                      AND sale_id IS NULL
                      AND receiving_id IS NULL
                );",
                params![item_id, definition_id],
                |row| row.get(0),
            )?,
            None => self.connection().query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM attribute_links
                    WHERE item_id = ?1
                      AND attribute_id IS NOT NULL
                      AND sale_id IS NULL
                      AND receiving_id IS NULL
                );",
                [item_id],
                |row| row.get(0),
            )?,
        };
        Ok(exists == 1)
    }

    fn delete_link(
        &self,
        item_id: ItemId,
        definition_id: Option<DefinitionId>,
    ) -> RepoResult<usize> {
        let removed = match definition_id {
            Some(definition_id) => self.connection().execute(
                "DELETE FROM attribute_links
                 WHERE item_id = ?1
                   AND definition_id = ?2
                   AND sale_id IS NULL
                   AND receiving_id IS NULL;",
                params![item_id, definition_id],
            )?,
            None => self.connection().execute(
                "DELETE FROM attribute_links
                 WHERE item_id = ?1
                   AND sale_id IS NULL
                   AND receiving_id IS NULL;",
                [item_id],
            )?,
        };
        Ok(removed)
    }

    fn delete_value(&mut self, value: &str, definition_id: DefinitionId) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let attribute_ids = {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT v.attribute_id
                 FROM attribute_values v
                 INNER JOIN attribute_links l ON l.attribute_id = v.attribute_id
                 WHERE v.attribute_value = ?1
                   AND l.definition_id = ?2;",
            )?;
            let mut rows = stmt.query(params![value, definition_id])?;
            let mut ids = Vec::new();
            while let Some(row) = rows.next()? {
                ids.push(row.get::<_, AttributeId>(0)?);
            }
            ids
        };

        let mut removed = 0;
        for attribute_id in &attribute_ids {
            removed += tx.execute(
                "DELETE FROM attribute_links
                 WHERE definition_id = ?1
                   AND attribute_id = ?2;",
                params![definition_id, attribute_id],
            )?;
            delete_value_if_unreferenced(&tx, *attribute_id)?;
        }

        tx.commit()?;
        Ok(removed)
    }

    fn copy_attribute_links(&self, item_id: ItemId, target: SnapshotTarget) -> RepoResult<usize> {
        let (sql, target_id) = match target {
            SnapshotTarget::Sale(sale_id) => (
                "INSERT INTO attribute_links (item_id, definition_id, attribute_id, sale_id)
                 SELECT l.item_id, l.definition_id, l.attribute_id, ?2
                 FROM attribute_links l
                 INNER JOIN attribute_definitions d
                    ON d.definition_id = l.definition_id
                   AND d.deleted = 0
                 WHERE l.item_id = ?1
                   AND l.sale_id IS NULL
                   AND l.receiving_id IS NULL;",
                sale_id,
            ),
            SnapshotTarget::Receiving(receiving_id) => (
                "INSERT INTO attribute_links (item_id, definition_id, attribute_id, receiving_id)
                 SELECT l.item_id, l.definition_id, l.attribute_id, ?2
                 FROM attribute_links l
                 INNER JOIN attribute_definitions d
                    ON d.definition_id = l.definition_id
                   AND d.deleted = 0
                 WHERE l.item_id = ?1
                   AND l.sale_id IS NULL
                   AND l.receiving_id IS NULL;",
                receiving_id,
            ),
        };
        let copied = self.connection().execute(sql, params![item_id, target_id])?;
        Ok(copied)
    }

    fn get_link_value(
        &self,
        item_id: ItemId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<AttributeLink>> {
        let link = self
            .connection()
            .query_row(
                "SELECT attribute_id, definition_id, item_id, sale_id, receiving_id
                 FROM attribute_links
                 WHERE item_id = ?1
                   AND definition_id = ?2
                   AND sale_id IS NULL
                   AND receiving_id IS NULL;",
                params![item_id, definition_id],
                parse_link_row,
            )
            .optional()?;
        Ok(link)
    }

    fn get_link_values(
        &self,
        item_id: ItemId,
        scope: LinkScope,
        flags: DefinitionFlags,
    ) -> RepoResult<LinkValuesSummary> {
        let mut sql = String::from(
            "SELECT v.attribute_value, v.attribute_date
             FROM attribute_links l
             INNER JOIN attribute_values v ON v.attribute_id = l.attribute_id
             INNER JOIN attribute_definitions d ON d.definition_id = l.definition_id
             WHERE d.definition_type <> 'GROUP'
               AND d.deleted = 0
               AND (d.definition_flags & ?) <> 0
               AND l.item_id = ?",
        );
        let mut bind_values = vec![
            Value::Integer(i64::from(flags.bits())),
            Value::Integer(item_id),
        ];

        match scope {
            LinkScope::Item => {
                sql.push_str(" AND l.sale_id IS NULL AND l.receiving_id IS NULL");
            }
            LinkScope::Sale(sale_id) => {
                sql.push_str(" AND l.sale_id = ?");
                bind_values.push(Value::Integer(sale_id));
            }
            LinkScope::Receiving(receiving_id) => {
                sql.push_str(" AND l.receiving_id = ?");
                bind_values.push(Value::Integer(receiving_id));
            }
        }
        sql.push_str(" ORDER BY l.definition_id ASC, v.attribute_id ASC;");

        let dates = load_date_format(self.connection())?;
        let mut stmt = self.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut texts = Vec::new();
        let mut rendered_dates = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(text) = row.get::<_, Option<String>>(0)? {
                texts.push(text);
            }
            if let Some(date) = row.get::<_, Option<chrono::NaiveDate>>(1)? {
                rendered_dates.push(dates.render(date));
            }
        }

        Ok(LinkValuesSummary {
            attribute_values: join_non_empty(texts),
            attribute_dtvalues: join_non_empty(rendered_dates),
        })
    }

    fn get_attribute_value(
        &self,
        item_id: ItemId,
        definition_id: DefinitionId,
    ) -> RepoResult<Option<AttributeValue>> {
        let value = self
            .connection()
            .query_row(
                "SELECT v.attribute_id, v.attribute_value, v.attribute_decimal, v.attribute_date
                 FROM attribute_values v
                 INNER JOIN attribute_links l ON l.attribute_id = v.attribute_id
                 WHERE l.item_id = ?1
                   AND l.definition_id = ?2
                   AND l.sale_id IS NULL
                   AND l.receiving_id IS NULL;",
                params![item_id, definition_id],
                |row| Ok(parse_value_row(row)),
            )
            .optional()?
            .transpose()?;
        Ok(value)
    }

    fn get_attribute_values(&self, item_id: ItemId) -> RepoResult<Vec<LinkedValue>> {
        let mut stmt = self.connection().prepare(&format!(
            "{LINKED_VALUE_SELECT_SQL}
             WHERE l.item_id = ?1
               AND l.sale_id IS NULL
               AND l.receiving_id IS NULL
             ORDER BY l.definition_id ASC;"
        ))?;
        let mut rows = stmt.query([item_id])?;
        collect_linked_values(&mut rows)
    }

    fn get_attributes_by_definition(
        &self,
        definition_id: DefinitionId,
    ) -> RepoResult<Vec<LinkedValue>> {
        linked_values_for_definition(self.connection(), definition_id)
    }

    fn get_suggestions(
        &self,
        definition_id: DefinitionId,
        term: &str,
    ) -> RepoResult<Vec<Suggestion>> {
        let mut stmt = self.connection().prepare(
            "SELECT DISTINCT v.attribute_id AS attribute_id, v.attribute_value AS attribute_value
             FROM attribute_definitions d
             INNER JOIN attribute_links l ON l.definition_id = d.definition_id
             INNER JOIN attribute_values v ON v.attribute_id = l.attribute_id
             WHERE d.definition_id = ?1
               AND d.deleted = 0
               AND v.attribute_value LIKE ?2 ESCAPE '\\'
             ORDER BY v.attribute_value ASC, v.attribute_id ASC;",
        )?;
        let mut rows = stmt.query(params![definition_id, like_pattern(term)])?;
        let mut suggestions = Vec::new();
        while let Some(row) = rows.next()? {
            suggestions.push(Suggestion {
                value: row.get("attribute_id")?,
                label: row.get("attribute_value")?,
            });
        }
        Ok(suggestions)
    }

    fn delete_orphaned_links(&self, definition_id: DefinitionId) -> RepoResult<usize> {
        let definition_type = definition_type_of(self.connection(), definition_id)?
            .ok_or(RepoError::DefinitionNotFound(definition_id))?;
        delete_orphaned_links_for(self.connection(), definition_id, definition_type)
    }

    fn delete_orphaned_values(&self) -> RepoResult<usize> {
        delete_orphaned_values_in(self.connection())
    }
}

pub(crate) fn parse_typed_value(
    value: &str,
    definition_type: DefinitionType,
    dates: &DateFormat,
) -> RepoResult<TypedValue> {
    TypedValue::parse(value, definition_type, dates).ok_or_else(|| RepoError::InvalidValue {
        value: value.to_string(),
        definition_type,
    })
}

/// Lowest attribute id whose type column equals `value`.
pub(crate) fn find_value(conn: &Connection, value: &TypedValue) -> RepoResult<Option<AttributeId>> {
    let sql = match value.column() {
        ValueColumn::Text => {
            "SELECT attribute_id FROM attribute_values
             WHERE attribute_value = ?1
             ORDER BY attribute_id ASC LIMIT 1;"
        }
        ValueColumn::Decimal => {
            "SELECT attribute_id FROM attribute_values
             WHERE attribute_decimal = ?1
             ORDER BY attribute_id ASC LIMIT 1;"
        }
        ValueColumn::Date => {
            "SELECT attribute_id FROM attribute_values
             WHERE attribute_date = ?1
             ORDER BY attribute_id ASC LIMIT 1;"
        }
    };
    let id = conn
        .query_row(sql, [value.storage_text()], |row| row.get(0))
        .optional()?;
    Ok(id)
}

pub(crate) fn insert_value(conn: &Connection, value: &TypedValue) -> RepoResult<AttributeId> {
    let sql = match value.column() {
        ValueColumn::Text => "INSERT INTO attribute_values (attribute_value) VALUES (?1);",
        ValueColumn::Decimal => "INSERT INTO attribute_values (attribute_decimal) VALUES (?1);",
        ValueColumn::Date => "INSERT INTO attribute_values (attribute_date) VALUES (?1);",
    };
    conn.execute(sql, [value.storage_text()])?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn find_or_insert_value(conn: &Connection, value: &TypedValue) -> RepoResult<AttributeId> {
    match find_value(conn, value)? {
        Some(attribute_id) => Ok(attribute_id),
        None => insert_value(conn, value),
    }
}

fn update_value_in_place(
    conn: &Connection,
    attribute_id: AttributeId,
    value: &TypedValue,
) -> RepoResult<()> {
    let sql = match value.column() {
        ValueColumn::Text => "UPDATE attribute_values SET attribute_value = ?2 WHERE attribute_id = ?1;",
        ValueColumn::Decimal => {
            "UPDATE attribute_values SET attribute_decimal = ?2 WHERE attribute_id = ?1;"
        }
        ValueColumn::Date => "UPDATE attribute_values SET attribute_date = ?2 WHERE attribute_id = ?1;",
    };
    conn.execute(sql, params![attribute_id, value.storage_text()])?;
    Ok(())
}

/// Replaces an item's current value for a definition.
///
/// The value row is updated in place only when this item's link is its sole
/// reference; shared rows are left alone and the link is repointed.
fn replace_item_value(
    conn: &Connection,
    item_id: ItemId,
    definition_id: DefinitionId,
    attribute_id: AttributeId,
    value: &TypedValue,
) -> RepoResult<AttributeId> {
    if let Some(existing) = find_value(conn, value)? {
        upsert_item_link(conn, item_id, definition_id, existing)?;
        if existing != attribute_id {
            delete_value_if_unreferenced(conn, attribute_id)?;
        }
        return Ok(existing);
    }

    let references = link_reference_count(conn, attribute_id)?;
    let owns_row = references == 1
        && item_link_attribute(conn, item_id, definition_id)? == Some(attribute_id);
    if owns_row {
        update_value_in_place(conn, attribute_id, value)?;
        return Ok(attribute_id);
    }

    let new_id = insert_value(conn, value)?;
    upsert_item_link(conn, item_id, definition_id, new_id)?;
    delete_value_if_unreferenced(conn, attribute_id)?;
    Ok(new_id)
}

pub(crate) fn upsert_item_link(
    conn: &Connection,
    item_id: ItemId,
    definition_id: DefinitionId,
    attribute_id: AttributeId,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE attribute_links
         SET attribute_id = ?3
         WHERE item_id = ?1
           AND definition_id = ?2
           AND sale_id IS NULL
           AND receiving_id IS NULL;",
        params![item_id, definition_id, attribute_id],
    )?;
    if changed == 0 {
        conn.execute(
            "INSERT INTO attribute_links (attribute_id, item_id, definition_id)
             VALUES (?1, ?2, ?3);",
            params![attribute_id, item_id, definition_id],
        )?;
    }
    Ok(())
}

/// Binds a value to the definition itself unless it already is.
pub(crate) fn ensure_anchor_link(
    conn: &Connection,
    definition_id: DefinitionId,
    attribute_id: AttributeId,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO attribute_links (attribute_id, definition_id)
         SELECT ?1, ?2
         WHERE NOT EXISTS (
            SELECT 1
            FROM attribute_links
            WHERE attribute_id = ?1
              AND definition_id = ?2
              AND item_id IS NULL
              AND sale_id IS NULL
              AND receiving_id IS NULL
         );",
        params![attribute_id, definition_id],
    )?;
    Ok(())
}

fn item_link_attribute(
    conn: &Connection,
    item_id: ItemId,
    definition_id: DefinitionId,
) -> RepoResult<Option<AttributeId>> {
    let attribute_id: Option<Option<AttributeId>> = conn
        .query_row(
            "SELECT attribute_id
             FROM attribute_links
             WHERE item_id = ?1
               AND definition_id = ?2
               AND sale_id IS NULL
               AND receiving_id IS NULL;",
            params![item_id, definition_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(attribute_id.flatten())
}

fn link_reference_count(conn: &Connection, attribute_id: AttributeId) -> RepoResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM attribute_links WHERE attribute_id = ?1;",
        [attribute_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn delete_value_if_unreferenced(conn: &Connection, attribute_id: AttributeId) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM attribute_values
         WHERE attribute_id = ?1
           AND NOT EXISTS (
             SELECT 1 FROM attribute_links WHERE attribute_id = ?1
           );",
        [attribute_id],
    )?;
    Ok(())
}

pub(crate) fn linked_values_for_definition(
    conn: &Connection,
    definition_id: DefinitionId,
) -> RepoResult<Vec<LinkedValue>> {
    let mut stmt = conn.prepare(&format!(
        "{LINKED_VALUE_SELECT_SQL}
         WHERE l.definition_id = ?1
         ORDER BY l.attribute_id ASC, l.item_id ASC;"
    ))?;
    let mut rows = stmt.query([definition_id])?;
    collect_linked_values(&mut rows)
}

/// Item ids whose links of a definition point at a text value.
pub(crate) fn items_by_value(
    conn: &Connection,
    value: Option<&str>,
    definition_id: DefinitionId,
) -> RepoResult<Vec<ItemId>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT l.item_id
         FROM attribute_links l
         INNER JOIN attribute_values v ON v.attribute_id = l.attribute_id
         WHERE l.definition_id = ?1
           AND l.item_id IS NOT NULL
           AND v.attribute_value IS ?2
         ORDER BY l.item_id ASC;",
    )?;
    let mut rows = stmt.query(params![definition_id, value])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(row.get(0)?);
    }
    Ok(items)
}

pub(crate) fn delete_orphaned_links_for(
    conn: &Connection,
    definition_id: DefinitionId,
    definition_type: DefinitionType,
) -> RepoResult<usize> {
    if definition_type == DefinitionType::Dropdown {
        return Ok(0);
    }

    let removed = conn.execute(
        "DELETE FROM attribute_links
         WHERE definition_id = ?1
           AND item_id IS NULL
           AND sale_id IS NULL
           AND receiving_id IS NULL;",
        [definition_id],
    )?;
    if removed > 0 {
        info!(
            "event=orphan_sweep module=repo status=ok target=links definition_id={definition_id} removed={removed}"
        );
    }
    Ok(removed)
}

pub(crate) fn delete_orphaned_values_in(conn: &Connection) -> RepoResult<usize> {
    let removed = conn.execute(
        "DELETE FROM attribute_values
         WHERE attribute_id NOT IN (
            SELECT DISTINCT attribute_id
            FROM attribute_links
            WHERE attribute_id IS NOT NULL
         );",
        [],
    )?;
    if removed > 0 {
        info!("event=orphan_sweep module=repo status=ok target=values removed={removed}");
    }
    Ok(removed)
}

fn join_non_empty(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn collect_linked_values(rows: &mut rusqlite::Rows<'_>) -> RepoResult<Vec<LinkedValue>> {
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(parse_linked_value_row(row)?);
    }
    Ok(values)
}

fn parse_link_row(row: &Row<'_>) -> rusqlite::Result<AttributeLink> {
    Ok(AttributeLink {
        attribute_id: row.get("attribute_id")?,
        definition_id: row.get("definition_id")?,
        item_id: row.get("item_id")?,
        sale_id: row.get("sale_id")?,
        receiving_id: row.get("receiving_id")?,
    })
}

fn parse_value_row(row: &Row<'_>) -> RepoResult<AttributeValue> {
    Ok(AttributeValue {
        attribute_id: row.get("attribute_id")?,
        attribute_value: row.get("attribute_value")?,
        attribute_decimal: parse_decimal_column(row.get("attribute_decimal")?)?,
        attribute_date: row.get("attribute_date")?,
    })
}

fn parse_linked_value_row(row: &Row<'_>) -> RepoResult<LinkedValue> {
    Ok(LinkedValue {
        definition_id: row.get("definition_id")?,
        attribute_id: row.get("attribute_id")?,
        item_id: row.get("item_id")?,
        attribute_value: row.get("attribute_value")?,
        attribute_decimal: parse_decimal_column(row.get("attribute_decimal")?)?,
        attribute_date: row.get("attribute_date")?,
    })
}

fn parse_decimal_column(value: Option<String>) -> RepoResult<Option<rust_decimal::Decimal>> {
    value
        .map(|text| {
            crate::model::value_kind::parse_decimal(&text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid decimal `{text}` in attribute_values.attribute_decimal"
                ))
            })
        })
        .transpose()
}
