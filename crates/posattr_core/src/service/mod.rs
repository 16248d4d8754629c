//! Core use-case services.
//!
//! # Responsibility
//! - Turn repository results into controller-facing responses.
//! - Keep callers decoupled from storage details and error types.

pub mod attribute_service;
