//! SQLite-backed attribute repository handle.
//!
//! # Responsibility
//! - Own the connection borrow shared by the definition store and the
//!   value/link manager.
//! - Reject connections that were not bootstrapped by `db::open_db*`.
//!
//! # Invariants
//! - Construction succeeds only on a fully migrated schema.
//! - Operations spanning several statements open their own transaction on
//!   the borrowed connection.

use crate::db::migrations::{current_user_version, latest_version};
use crate::repo::{RepoError, RepoResult};
use rusqlite::Connection;

const REQUIRED_TABLES: [&str; 4] = [
    "attribute_definitions",
    "attribute_values",
    "attribute_links",
    "app_config",
];

/// SQLite-backed implementation of
/// [`DefinitionRepository`](crate::repo::definition_repo::DefinitionRepository) and
/// [`ValueRepository`](crate::repo::value_repo::ValueRepository).
pub struct SqliteAttributeRepository<'conn> {
    pub(crate) conn: &'conn mut Connection,
}

impl<'conn> SqliteAttributeRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_attribute_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Read-only view of the borrowed connection.
    pub fn connection(&self) -> &Connection {
        &*self.conn
    }
}

fn ensure_attribute_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
