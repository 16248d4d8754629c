//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for attributes.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Every statement is parameterized; column names only come from typed
//!   enums, never from caller strings.
//! - Multi-statement writes run inside one SQLite transaction.

use crate::db::DbError;
use crate::model::attribute::{DefinitionId, DefinitionType};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attribute_repo;
pub mod config_repo;
pub mod conversion;
pub mod definition_repo;
pub mod value_repo;

pub use conversion::ConversionError;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for attribute persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Target definition does not exist or is soft-deleted.
    DefinitionNotFound(DefinitionId),
    /// GROUP definitions only contain other definitions.
    GroupDefinition(DefinitionId),
    /// Input value cannot be stored under the definition type.
    InvalidValue {
        value: String,
        definition_type: DefinitionType,
    },
    /// Changing the definition type could not convert its values.
    Conversion(ConversionError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DefinitionNotFound(id) => write!(f, "attribute definition not found: {id}"),
            Self::GroupDefinition(id) => {
                write!(f, "attribute definition {id} is a group and holds no values")
            }
            Self::InvalidValue {
                value,
                definition_type,
            } => write!(f, "value `{value}` is not a valid {definition_type} value"),
            Self::Conversion(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "attribute repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "attribute repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted attribute data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conversion(err) => Some(err),
            Self::DefinitionNotFound(_) | Self::GroupDefinition(_) => None,
            Self::InvalidValue { .. } => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ConversionError> for RepoError {
    fn from(value: ConversionError) -> Self {
        Self::Conversion(value)
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside `LIKE ... ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
