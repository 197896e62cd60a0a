use thiserror::Error;

/// Errors surfaced by guild-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite failure. Surfaced to the caller of the
    /// action that triggered it; never retried here.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The store file or its root directory could not be created or opened.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A lookup by an explicitly requested identifier found no matching row.
    /// Lookups that may legitimately miss return `Option` instead.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The write would violate a uniqueness invariant; the prior state is
    /// left unchanged.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
