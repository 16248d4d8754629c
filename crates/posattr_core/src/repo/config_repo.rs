//! Key/value application configuration stored in `app_config`.
//!
//! # Responsibility
//! - Provide the `get(key)` accessor views and repositories read settings through.
//! - Persist single and batch setting updates.
//!
//! # Invariants
//! - Keys are unique; `set` overwrites.
//! - `batch_save` is all-or-nothing.

use crate::model::date_format::{DateFormat, DEFAULT_DATE_FORMAT};
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

/// Config key holding the PHP-style display/input date format.
pub const DATE_FORMAT_KEY: &str = "dateformat";

/// Repository interface for application settings.
pub trait ConfigRepository {
    /// Returns the raw value for `key`, if set.
    fn get(&self, key: &str) -> RepoResult<Option<String>>;
    /// Returns the value for `key` or `default` when unset.
    fn get_or(&self, key: &str, default: &str) -> RepoResult<String>;
    /// Returns every setting ordered by key.
    fn get_all(&self) -> RepoResult<BTreeMap<String, String>>;
    /// Inserts or overwrites one setting.
    fn set(&self, key: &str, value: &str) -> RepoResult<()>;
    /// Inserts or overwrites many settings in one transaction.
    fn batch_save(&self, settings: &[(&str, &str)]) -> RepoResult<()>;
    /// Removes one setting. Returns whether it existed.
    fn delete(&self, key: &str) -> RepoResult<bool>;
    /// Configured date format, falling back to `m/d/Y`.
    fn date_format(&self) -> RepoResult<DateFormat>;
}

/// SQLite-backed settings repository.
pub struct SqliteConfigRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteConfigRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ConfigRepository for SqliteConfigRepository<'_> {
    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        get_setting(self.conn, key)
    }

    fn get_or(&self, key: &str, default: &str) -> RepoResult<String> {
        Ok(get_setting(self.conn, key)?.unwrap_or_else(|| default.to_string()))
    }

    fn get_all(&self) -> RepoResult<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM app_config ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut settings = BTreeMap::new();
        while let Some(row) = rows.next()? {
            settings.insert(row.get("key")?, row.get("value")?);
        }
        Ok(settings)
    }

    fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        upsert_setting(self.conn, key, value)
    }

    fn batch_save(&self, settings: &[(&str, &str)]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in settings {
            upsert_setting(&tx, key, value)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM app_config WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn date_format(&self) -> RepoResult<DateFormat> {
        load_date_format(self.conn)
    }
}

pub(crate) fn get_setting(conn: &Connection, key: &str) -> RepoResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM app_config WHERE key = ?1;",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub(crate) fn load_date_format(conn: &Connection) -> RepoResult<DateFormat> {
    let pattern = get_setting(conn, DATE_FORMAT_KEY)?
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    Ok(DateFormat::from_php(&pattern))
}

fn upsert_setting(conn: &Connection, key: &str, value: &str) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO app_config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![key, value],
    )?;
    Ok(())
}
