//! Attribute use-case service.
//!
//! # Responsibility
//! - Provide the definition-management and item-attribute APIs a POS
//!   controller calls.
//! - Convert repository failures into `{success: false, message}` replies
//!   and log them.
//!
//! # Invariants
//! - Write operations never surface `RepoError` to callers; they return an
//!   [`ActionResponse`].
//! - A missing definition is rendered as the blank placeholder detail.
//! - CHECKBOX input is stored as the canonical `"0"`/`"1"` text.

use crate::model::attribute::{
    AttributeId, DefinitionDetail, DefinitionDraft, DefinitionId, DefinitionType, ItemId,
    SnapshotTarget, Suggestion,
};
use crate::model::value_kind::{is_falsy_checkbox_text, CHECKBOX_FALSE, CHECKBOX_TRUE};
use crate::repo::definition_repo::{DefinitionRepository, DefinitionSearchQuery, SaveAction};
use crate::repo::value_repo::ValueRepository;
use crate::repo::{RepoError, RepoResult};
use log::{error, info};
use serde::Serialize;

/// JSON reply envelope for write actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>, id: Option<i64>) -> Self {
        Self {
            success: true,
            message: message.into(),
            id,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            id: None,
        }
    }
}

/// One page of the definition table plus the unpaged match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionTable {
    pub total: u64,
    pub rows: Vec<DefinitionDetail>,
}

/// Attribute service facade over repository implementations.
pub struct AttributeService<R: DefinitionRepository + ValueRepository> {
    repo: R,
}

impl<R: DefinitionRepository + ValueRepository> AttributeService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Borrows the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Inserts, updates, or undeletes a definition.
    ///
    /// DROPDOWN `options` are anchored in the same transaction as the
    /// definition row.
    pub fn save_definition(
        &mut self,
        draft: &DefinitionDraft,
        definition_id: Option<DefinitionId>,
        options: &[String],
    ) -> ActionResponse {
        let saved = match self
            .repo
            .save_definition_with_options(draft, definition_id, options)
        {
            Ok(saved) => saved,
            Err(err) => {
                return failure(
                    "definition_save",
                    format!("Attribute definition `{}` could not be saved", draft.definition_name),
                    &err,
                )
            }
        };

        let verb = match saved.action {
            SaveAction::Inserted => "added",
            SaveAction::Updated => "updated",
            SaveAction::Undeleted => "restored",
        };
        ActionResponse::ok(
            format!("Attribute definition `{}` {verb}", draft.definition_name),
            Some(saved.definition_id),
        )
    }

    /// Soft-deletes every listed definition.
    pub fn delete_definitions(&self, definition_ids: &[DefinitionId]) -> ActionResponse {
        match self.repo.delete_definition_list(definition_ids) {
            Ok(0) => ActionResponse::failed("No attribute definitions were deleted"),
            Ok(count) => ActionResponse::ok(format!("{count} attribute definition(s) deleted"), None),
            Err(err) => failure(
                "definition_delete",
                "Attribute definitions could not be deleted".to_string(),
                &err,
            ),
        }
    }

    /// Restores one soft-deleted definition.
    pub fn restore_definition(&self, definition_id: DefinitionId) -> ActionResponse {
        match self.repo.undelete(definition_id) {
            Ok(()) => ActionResponse::ok("Attribute definition restored", Some(definition_id)),
            Err(err) => failure(
                "definition_undelete",
                format!("Attribute definition {definition_id} could not be restored"),
                &err,
            ),
        }
    }

    /// Definition detail, or the blank placeholder when it does not exist.
    pub fn definition_info(&self, definition_id: DefinitionId) -> RepoResult<DefinitionDetail> {
        Ok(self.repo.get_info(definition_id)?.unwrap_or_default())
    }

    pub fn definition_table(&self, query: &DefinitionSearchQuery) -> RepoResult<DefinitionTable> {
        let rows = self.repo.search(query)?;
        let total = self.repo.get_found_rows(&query.search)?;
        Ok(DefinitionTable { total, rows })
    }

    /// Adds one DROPDOWN option.
    pub fn add_dropdown_option(
        &mut self,
        definition_id: DefinitionId,
        option: &str,
    ) -> ActionResponse {
        match self
            .repo
            .save_value(option, definition_id, None, None, DefinitionType::Dropdown)
        {
            Ok(attribute_id) => ActionResponse::ok("Dropdown option added", Some(attribute_id)),
            Err(err) => failure(
                "dropdown_option_add",
                format!("Dropdown option `{option}` could not be added"),
                &err,
            ),
        }
    }

    /// Removes a text value from a definition and every link using it.
    pub fn remove_definition_value(
        &mut self,
        definition_id: DefinitionId,
        value: &str,
    ) -> ActionResponse {
        match self.repo.delete_value(value, definition_id) {
            Ok(0) => ActionResponse::failed(format!("Value `{value}` is not used by this attribute")),
            Ok(count) => ActionResponse::ok(format!("Value `{value}` removed from {count} link(s)"), None),
            Err(err) => failure(
                "definition_value_delete",
                format!("Value `{value}` could not be removed"),
                &err,
            ),
        }
    }

    /// Sets an item's value for one definition, replacing any previous value.
    pub fn save_item_attribute(
        &mut self,
        item_id: ItemId,
        definition_id: DefinitionId,
        raw_value: &str,
    ) -> ActionResponse {
        match self.store_item_attribute(item_id, definition_id, raw_value) {
            Ok(attribute_id) => ActionResponse::ok("Item attribute saved", Some(attribute_id)),
            Err(err) => failure(
                "item_attribute_save",
                format!("Attribute for item {item_id} could not be saved"),
                &err,
            ),
        }
    }

    /// Removes an item's item-scoped links (all of them when
    /// `definition_id` is `None`).
    pub fn clear_item_attributes(
        &self,
        item_id: ItemId,
        definition_id: Option<DefinitionId>,
    ) -> ActionResponse {
        match self.repo.delete_link(item_id, definition_id) {
            Ok(count) => ActionResponse::ok(format!("{count} item attribute(s) removed"), None),
            Err(err) => failure(
                "item_attribute_delete",
                format!("Attributes for item {item_id} could not be removed"),
                &err,
            ),
        }
    }

    /// Freezes an item's current attributes onto a sale or receiving line.
    pub fn snapshot_item(&self, item_id: ItemId, target: SnapshotTarget) -> ActionResponse {
        match self.repo.copy_attribute_links(item_id, target) {
            Ok(count) => ActionResponse::ok(format!("{count} attribute(s) copied"), None),
            Err(err) => failure(
                "attribute_snapshot",
                format!("Attributes for item {item_id} could not be copied"),
                &err,
            ),
        }
    }

    pub fn suggestions(&self, definition_id: DefinitionId, term: &str) -> RepoResult<Vec<Suggestion>> {
        self.repo.get_suggestions(definition_id, term)
    }

    /// Deletes every value row no link references.
    pub fn purge_orphaned_values(&self) -> ActionResponse {
        match self.repo.delete_orphaned_values() {
            Ok(count) => {
                info!("event=orphan_purge module=service status=ok removed={count}");
                ActionResponse::ok(format!("{count} unused value(s) removed"), None)
            }
            Err(err) => failure(
                "orphan_purge",
                "Unused values could not be removed".to_string(),
                &err,
            ),
        }
    }

    fn store_item_attribute(
        &mut self,
        item_id: ItemId,
        definition_id: DefinitionId,
        raw_value: &str,
    ) -> RepoResult<AttributeId> {
        let definition = self
            .repo
            .get_info(definition_id)?
            .filter(|detail| !detail.deleted)
            .ok_or(RepoError::DefinitionNotFound(definition_id))?;
        let definition_type = definition.definition_type;
        let value = if definition_type == DefinitionType::Checkbox {
            checkbox_text(raw_value)
        } else {
            raw_value.trim()
        };

        let current = self
            .repo
            .get_link_value(item_id, definition_id)?
            .and_then(|link| link.attribute_id);
        self.repo
            .save_value(value, definition_id, Some(item_id), current, definition_type)
    }
}

fn checkbox_text(raw_value: &str) -> &'static str {
    let trimmed = raw_value.trim();
    if is_falsy_checkbox_text(Some(trimmed)) || trimmed.eq_ignore_ascii_case("false") {
        CHECKBOX_FALSE
    } else {
        CHECKBOX_TRUE
    }
}

fn failure(event: &str, message: String, err: &RepoError) -> ActionResponse {
    error!("event={event} module=service status=error error={err}");
    ActionResponse::failed(format!("{message}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{checkbox_text, ActionResponse};

    #[test]
    fn checkbox_input_maps_to_canonical_text() {
        assert_eq!(checkbox_text(""), "0");
        assert_eq!(checkbox_text(" 0 "), "0");
        assert_eq!(checkbox_text("false"), "0");
        assert_eq!(checkbox_text("on"), "1");
        assert_eq!(checkbox_text("1"), "1");
    }

    #[test]
    fn failed_response_has_no_id() {
        let response = ActionResponse::failed("nope");
        assert!(!response.success);
        assert_eq!(response.id, None);
    }
}
