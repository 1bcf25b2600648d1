//! Durable mirroring of session state
//!
//! The in-memory session is authoritative. A [`DocumentMirror`] receives a
//! full [`DocumentSnapshot`] after every mutation and hands one back when a
//! session is hydrated.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::feature::Feature;
use crate::moment::MomentLogSnapshot;

/// Serializable copy of the features and the moment log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Features in display order
    pub features: Vec<Feature>,
    /// Display position of each feature, parallel to `features`
    #[serde(default)]
    pub positions: Vec<u64>,
    /// Position the next appended feature takes
    #[serde(default)]
    pub next_position: u64,
    /// Undo and redo stacks
    pub moment_log: MomentLogSnapshot,
    /// When the snapshot was taken
    pub saved_at: Option<DateTime<Utc>>,
}

/// Persistence collaborator mirroring the session to durable storage
#[async_trait]
pub trait DocumentMirror: Send + Sync {
    /// Persist the latest snapshot, replacing any previous one
    async fn store(&self, snapshot: &DocumentSnapshot) -> Result<(), PersistenceError>;

    /// Most recently persisted snapshot, if any
    async fn load(&self) -> Result<Option<DocumentSnapshot>, PersistenceError>;
}

/// Mirror keeping the last snapshot in memory
#[derive(Debug, Default)]
pub struct InMemoryMirror {
    latest: RwLock<Option<DocumentSnapshot>>,
    writes: RwLock<usize>,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror pre-seeded with a snapshot (useful for hydration tests)
    pub fn with_snapshot(snapshot: DocumentSnapshot) -> Self {
        InMemoryMirror {
            latest: RwLock::new(Some(snapshot)),
            writes: RwLock::new(0),
        }
    }

    /// Number of snapshots stored so far
    pub fn write_count(&self) -> usize {
        *self.writes.read()
    }

    /// Clone of the last stored snapshot
    pub fn latest(&self) -> Option<DocumentSnapshot> {
        self.latest.read().clone()
    }
}

#[async_trait]
impl DocumentMirror for InMemoryMirror {
    async fn store(&self, snapshot: &DocumentSnapshot) -> Result<(), PersistenceError> {
        *self.latest.write() = Some(snapshot.clone());
        *self.writes.write() += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<DocumentSnapshot>, PersistenceError> {
        Ok(self.latest.read().clone())
    }
}

/// Mirror writing pretty JSON to a single file
#[derive(Debug, Clone)]
pub struct JsonFileMirror {
    path: PathBuf,
}

impl JsonFileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileMirror { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentMirror for JsonFileMirror {
    async fn store(&self, snapshot: &DocumentSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json_data = serde_json::to_string_pretty(snapshot)?;

        // Write beside the target, then rename over it
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json_data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            features = snapshot.features.len(),
            "Document mirrored"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<DocumentSnapshot>, PersistenceError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let json_data = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: DocumentSnapshot = serde_json::from_str(&json_data)?;

        info!(
            path = %self.path.display(),
            features = snapshot.features.len(),
            "Document snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}
