//! Transactional feature store for the placemark editor
//!
//! Holds the authoritative set of geometric features of the open document,
//! applies named batches of create/update/delete operations atomically, and
//! records each batch as a reversible moment in a linear undo/redo log.
//!
//! ```text
//! caller ──transact──▶ Session ──▶ TransactionEngine ──▶ FeatureStore
//!                        │              │                    │
//!                        │              └─record─▶ MomentLog  └─▶ EventBus
//!                        └──undo/redo──▶ HistoryController ─────▶ observers
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod feature;
pub mod history;
pub mod moment;
pub mod operation;
pub mod persistence;
pub mod session;
pub mod store;
pub mod transaction;

// Re-export public API
pub use bus::{EventBus, StoreEvent};
pub use config::{ConfigLoader, HistoryConfig, PersistenceConfig, SessionConfig};
pub use error::{ConflictError, PersistenceError, StoreError, StoreResult};
pub use feature::{Extent, Feature, FeatureId, FeaturePatch, Geometry, Position, Properties, PropertyChange};
pub use history::{Direction, HistoryController, HistoryOutcome};
pub use moment::{Moment, MomentLog, MomentLogSnapshot, NavigationEntry};
pub use operation::{Operation, OperationKind};
pub use persistence::{DocumentMirror, DocumentSnapshot, InMemoryMirror, JsonFileMirror};
pub use session::{Session, TransactRequest, NEW_DOCUMENT_NOTE};
pub use store::FeatureStore;
pub use transaction::TransactionEngine;
