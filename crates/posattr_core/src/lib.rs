//! Core domain logic for posattr: custom item attributes for a POS.
//! This crate owns the attribute schema and every rule about it.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attribute::{
    AttributeDefinition, AttributeId, AttributeLink, AttributeValue, DefinitionDetail,
    DefinitionDraft, DefinitionFlags, DefinitionId, DefinitionName, DefinitionType, ItemAttribute,
    ItemId, LinkScope, LinkValuesSummary, LinkedValue, ReceivingId, SaleId, SnapshotTarget,
    Suggestion,
};
pub use model::date_format::DateFormat;
pub use repo::attribute_repo::SqliteAttributeRepository;
pub use repo::config_repo::{ConfigRepository, SqliteConfigRepository};
pub use repo::conversion::{plan_conversion, ConversionOutcome, ConversionPlan};
pub use repo::definition_repo::{
    definition_flag_names, DefinitionRepository, DefinitionSearchQuery, DefinitionSort,
    SaveAction, SavedDefinition, SortOrder,
};
pub use repo::value_repo::ValueRepository;
pub use repo::{ConversionError, RepoError, RepoResult};
pub use service::attribute_service::{ActionResponse, AttributeService, DefinitionTable};

/// Minimal health-check API for wiring checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn license_is_inherited_from_workspace() {
        assert_eq!(env!("CARGO_PKG_LICENSE"), "MIT");
    }
}
