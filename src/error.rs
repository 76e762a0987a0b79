//! Error taxonomy for the catalog engine.
//!
//! Row-level validation problems are not errors here: they are carried on
//! staged rows so the caller can correct and retry. This enum covers the
//! failures that abort an operation or reject part of a batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Unsupported upload format or undecodable content. Fatal before any
    /// parsing happens.
    #[error("unsupported file format: {0}")]
    Format(String),

    /// Upload exceeds the per-call row ceiling. Fatal, nothing is written.
    #[error("upload contains {count} rows, exceeding the limit of {limit}")]
    LimitExceeded { count: usize, limit: usize },

    /// Duplicate SKU, write to a non-editable field, or configuration of a
    /// field that holds no data. `items` names every offender, not just
    /// the first.
    #[error("{reason}: {}", items.join(", "))]
    Conflict { reason: String, items: Vec<String> },

    /// Referenced row does not exist for the tenant.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// All-or-nothing commit rejected because some rows were invalid or
    /// duplicates. `rows` holds one message per offending row.
    #[error("batch rejected: {}", rows.join("; "))]
    BatchRejected { rows: Vec<String> },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn conflict(reason: impl Into<String>, items: Vec<String>) -> Self {
        CatalogError::Conflict {
            reason: reason.into(),
            items,
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
