//! Error types for the model translator

use thiserror::Error;

use crate::dof::Dof;

/// Main error type for model translation operations
///
/// Only structural impossibilities surface here: unresolvable references,
/// constraints that disagree on a value, geometry too degenerate to derive
/// from. Data-quality findings (ineffective loads, empty sets, unreachable
/// assertions) are recovered in place and logged, never returned as errors.
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("unresolved {kind} reference {reference}")]
    UnresolvedReference {
        kind: &'static str,
        reference: String,
    },

    #[error(
        "conflicting single point constraints on node {node_id} dof {dof}: \
         {first} fixes {first_value} but {second} fixes {second_value}"
    )]
    InconsistentConstraint {
        node_id: u32,
        dof: Dof,
        first: String,
        first_value: f64,
        second: String,
        second_value: f64,
    },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid numeric dof code {0}")]
    InvalidDofCode(u32),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("model validation failed: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for model translation operations
pub type TranslationResult<T> = Result<T, TranslationError>;
