//! Attribute domain model.
//!
//! # Responsibility
//! - Define the canonical definition/value/link records used by repositories.
//! - Own value-type parsing and rendering rules (dates, decimals, checkboxes).
//!
//! # Invariants
//! - `DefinitionType` decides which `attribute_values` column is authoritative.
//! - Deletion of definitions is a soft-delete flag, never a physical delete.

pub mod attribute;
pub mod date_format;
pub mod value_kind;
