//! Mutation operations carried by transactions and moments

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::feature::{Feature, FeatureId, FeaturePatch};

/// Kind of an operation, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "Create"),
            OperationKind::Update => write!(f, "Update"),
            OperationKind::Delete => write!(f, "Delete"),
        }
    }
}

/// A single create, update or delete of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Insert a feature under an identifier that must not exist yet
    ///
    /// `position` pins the feature's slot in display order. Without one the
    /// feature goes to the end.
    Create {
        feature: Feature,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<u64>,
    },
    /// Patch fields of an existing feature
    Update { id: FeatureId, patch: FeaturePatch },
    /// Remove an existing feature
    Delete { id: FeatureId },
}

impl Operation {
    pub fn create(feature: Feature) -> Self {
        Operation::Create {
            feature,
            position: None,
        }
    }

    /// Create at a known display position
    pub fn create_at(feature: Feature, position: u64) -> Self {
        Operation::Create {
            feature,
            position: Some(position),
        }
    }

    pub fn update(id: impl Into<FeatureId>, patch: FeaturePatch) -> Self {
        Operation::Update {
            id: id.into(),
            patch,
        }
    }

    pub fn delete(id: impl Into<FeatureId>) -> Self {
        Operation::Delete { id: id.into() }
    }

    /// Identifier the operation targets
    pub fn target(&self) -> &FeatureId {
        match self {
            Operation::Create { feature, .. } => &feature.id,
            Operation::Update { id, .. } | Operation::Delete { id } => id,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}
