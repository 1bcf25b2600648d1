//! Error types for the feature store

use thiserror::Error;

use crate::feature::FeatureId;
use crate::history::Direction;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// An operation batch is inconsistent with the current state
///
/// `index` is the position of the offending operation within its batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// Create targeted an identifier that is already present
    #[error("Feature already exists: {id} (operation {index})")]
    AlreadyExists { id: FeatureId, index: usize },

    /// Update or delete targeted an identifier that is not present
    #[error("Feature not found: {id} (operation {index})")]
    NotFound { id: FeatureId, index: usize },
}

impl ConflictError {
    /// Identifier the conflicting operation targeted
    pub fn id(&self) -> &FeatureId {
        match self {
            ConflictError::AlreadyExists { id, .. } | ConflictError::NotFound { id, .. } => id,
        }
    }
}

/// Errors raised by the durable mirror collaborator
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur in the store, the history controller or the session
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transaction rejected before any mutation
    #[error("Transaction conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// A recorded moment could not be replayed against the current state
    #[error("History corrupted during {direction} of \"{note}\": {source}")]
    HistoryCorruption {
        direction: Direction,
        note: String,
        #[source]
        source: ConflictError,
    },

    /// Malformed request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable mirror error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a new Conflict error for a missing target
    pub fn conflict_not_found(id: impl Into<FeatureId>, index: usize) -> Self {
        Self::Conflict(ConflictError::NotFound {
            id: id.into(),
            index,
        })
    }

    /// Create a new ValidationError with context
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Config error with context
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error signals that the moment log and the store diverged
    pub fn is_history_corruption(&self) -> bool {
        matches!(self, StoreError::HistoryCorruption { .. })
    }

    /// Whether this error is a rejected transaction
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
