//! Editing session: the single owner of the feature store and the moment log
//!
//! Every mutation (new transactions and history steps) waits its turn on one
//! FIFO mutation queue and fully completes, including change notification and
//! durable mirroring, before the next one starts. The in-memory apply runs
//! under a write lock held only for the synchronous part, so readers see
//! either the state before a batch or the state after it.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, StoreEvent};
use crate::config::SessionConfig;
use crate::error::StoreResult;
use crate::feature::{Extent, Feature, FeatureId, FeaturePatch};
use crate::history::{Direction, HistoryController, HistoryOutcome};
use crate::moment::{Moment, MomentLog, MomentLogSnapshot};
use crate::operation::Operation;
use crate::persistence::{DocumentMirror, DocumentSnapshot, JsonFileMirror};
use crate::store::FeatureStore;
use crate::transaction::TransactionEngine;

/// Note recorded by [`Session::new_document`]
pub const NEW_DOCUMENT_NOTE: &str = "New document";

/// Batch mutation request
///
/// Operations are applied deletes first, then creates, then updates.
#[derive(Debug, Clone, Default)]
pub struct TransactRequest {
    pub note: String,
    pub create_features: Vec<Feature>,
    pub update_features: Vec<(FeatureId, FeaturePatch)>,
    pub delete_features: Vec<FeatureId>,
}

impl TransactRequest {
    pub fn new(note: impl Into<String>) -> Self {
        TransactRequest {
            note: note.into(),
            ..Self::default()
        }
    }

    pub fn create(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.create_features.extend(features);
        self
    }

    pub fn update(mut self, id: impl Into<FeatureId>, patch: FeaturePatch) -> Self {
        self.update_features.push((id.into(), patch));
        self
    }

    pub fn delete(mut self, ids: impl IntoIterator<Item = FeatureId>) -> Self {
        self.delete_features.extend(ids);
        self
    }

    /// Flatten into an ordered operation batch
    pub fn into_ops(self) -> (String, Vec<Operation>) {
        let mut ops = Vec::with_capacity(
            self.delete_features.len() + self.create_features.len() + self.update_features.len(),
        );
        ops.extend(self.delete_features.into_iter().map(Operation::delete));
        ops.extend(self.create_features.into_iter().map(Operation::create));
        ops.extend(
            self.update_features
                .into_iter()
                .map(|(id, patch)| Operation::update(id, patch)),
        );
        (self.note, ops)
    }
}

struct SessionState {
    store: FeatureStore,
    log: MomentLog,
}

/// One editing session
///
/// ```rust
/// use placemark_store::{Feature, Geometry, Session, SessionConfig, TransactRequest};
///
/// # tokio_test::block_on(async {
/// let session = Session::new(SessionConfig::default()).unwrap();
/// session
///     .transact(TransactRequest::new("Draw").create([Feature::new("a", Geometry::point(0.0, 0.0))]))
///     .await
///     .unwrap();
/// assert_eq!(session.feature_count(), 1);
///
/// session.undo().await.unwrap();
/// assert_eq!(session.feature_count(), 0);
/// assert_eq!(session.observe_moment_log().redo_notes(), vec!["Draw"]);
/// # });
/// ```
pub struct Session {
    state: RwLock<SessionState>,
    queue: Mutex<()>,
    mirror: Option<Arc<dyn DocumentMirror>>,
    bus: EventBus,
    config: SessionConfig,
}

impl Session {
    /// Empty in-memory session
    pub fn new(config: SessionConfig) -> StoreResult<Self> {
        config.validate()?;
        let bus = EventBus::with_capacity(config.event_channel_capacity);
        let state = SessionState {
            store: FeatureStore::new(bus.clone()),
            log: MomentLog::with_max_undo(config.history.max_undo_stack_size),
        };

        Ok(Session {
            state: RwLock::new(state),
            queue: Mutex::new(()),
            mirror: None,
            bus,
            config,
        })
    }

    /// Empty session mirrored to `mirror` after every mutation
    pub fn with_mirror(config: SessionConfig, mirror: Arc<dyn DocumentMirror>) -> StoreResult<Self> {
        let mut session = Self::new(config)?;
        session.mirror = Some(mirror);
        Ok(session)
    }

    /// Session restored from the mirror's last snapshot, or empty if it has none
    pub async fn hydrate(config: SessionConfig, mirror: Arc<dyn DocumentMirror>) -> StoreResult<Self> {
        let snapshot = mirror.load().await?;
        let session = Self::with_mirror(config, mirror)?;

        if let Some(snapshot) = snapshot {
            let store = FeatureStore::from_positioned(
                snapshot.features,
                &snapshot.positions,
                snapshot.next_position,
                session.bus.clone(),
            )?;
            let log = MomentLog::from_snapshot(
                snapshot.moment_log,
                session.config.history.max_undo_stack_size,
            );
            let feature_count = store.len();
            *session.state.write() = SessionState { store, log };

            info!(feature_count, "Session hydrated");
            session
                .bus
                .publish(StoreEvent::DocumentHydrated { feature_count });
        }

        Ok(session)
    }

    /// Session as described by `config`: hydrated from a JSON file mirror when
    /// persistence is enabled, in-memory otherwise
    pub async fn open(config: SessionConfig) -> StoreResult<Self> {
        config.validate()?;
        match (config.persistence.enabled, config.persistence.path.clone()) {
            (true, Some(path)) => Self::hydrate(config, Arc::new(JsonFileMirror::new(path))).await,
            _ => Self::new(config),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Apply a batch request as one undoable moment
    pub async fn transact(&self, request: TransactRequest) -> StoreResult<Moment> {
        let (note, ops) = request.into_ops();
        self.transact_ops(note, ops).await
    }

    /// Apply `ops` as one undoable moment
    pub async fn transact_ops(&self, note: impl Into<String>, ops: Vec<Operation>) -> StoreResult<Moment> {
        let note = note.into();
        let _turn = self.queue.lock().await;

        let moment = {
            let mut state = self.state.write();
            let SessionState { store, log } = &mut *state;
            TransactionEngine::transact(store, log, note, ops)?
        };

        self.mirror_state().await;
        Ok(moment)
    }

    /// Build a batch from the current state and apply it, within one turn of
    /// the mutation queue
    ///
    /// Returns `None` without recording anything when `build` yields no
    /// operations.
    pub async fn transact_with<F>(&self, note: impl Into<String>, build: F) -> StoreResult<Option<Moment>>
    where
        F: FnOnce(&FeatureStore) -> Vec<Operation> + Send,
    {
        let note = note.into();
        let _turn = self.queue.lock().await;

        let moment = {
            let mut state = self.state.write();
            let SessionState { store, log } = &mut *state;
            let ops = build(&*store);
            if ops.is_empty() {
                debug!(note = %note, "Nothing to transact");
                None
            } else {
                Some(TransactionEngine::transact(store, log, note, ops)?)
            }
        };

        if moment.is_some() {
            self.mirror_state().await;
        }
        Ok(moment)
    }

    /// Delete every feature as one undoable moment
    ///
    /// An already empty document records nothing.
    pub async fn new_document(&self) -> StoreResult<Option<Moment>> {
        self.transact_with(NEW_DOCUMENT_NOTE, |store| {
            store.ids().into_iter().map(Operation::delete).collect()
        })
        .await
    }

    /// Replace every feature with `features` as one undoable moment
    pub async fn replace_all(&self, note: impl Into<String>, features: Vec<Feature>) -> StoreResult<Option<Moment>> {
        self.transact_with(note, move |store| {
            let mut ops: Vec<Operation> = store.ids().into_iter().map(Operation::delete).collect();
            ops.extend(features.into_iter().map(Operation::create));
            ops
        })
        .await
    }

    /// Revert the most recent moment
    pub async fn undo(&self) -> StoreResult<HistoryOutcome> {
        self.step(Direction::Undo).await
    }

    /// Reapply the most recently undone moment
    pub async fn redo(&self) -> StoreResult<HistoryOutcome> {
        self.step(Direction::Redo).await
    }

    /// Undo up to `steps` moments one at a time, returning how many were applied
    pub async fn undo_steps(&self, steps: usize) -> StoreResult<usize> {
        self.walk(Direction::Undo, steps).await
    }

    /// Redo up to `steps` moments one at a time, returning how many were applied
    pub async fn redo_steps(&self, steps: usize) -> StoreResult<usize> {
        self.walk(Direction::Redo, steps).await
    }

    async fn walk(&self, direction: Direction, steps: usize) -> StoreResult<usize> {
        let mut applied = 0;
        for _ in 0..steps {
            // Each step depends on the log left by the previous one
            match self.step(direction).await? {
                HistoryOutcome::Applied { .. } => applied += 1,
                HistoryOutcome::NothingToDo => break,
            }
        }
        debug!(%direction, requested = steps, applied, "History walk finished");
        Ok(applied)
    }

    async fn step(&self, direction: Direction) -> StoreResult<HistoryOutcome> {
        let _turn = self.queue.lock().await;

        let result = {
            let mut state = self.state.write();
            let SessionState { store, log } = &mut *state;
            HistoryController::step(store, log, direction)
        };

        match &result {
            Ok(HistoryOutcome::NothingToDo) => {}
            Ok(HistoryOutcome::Applied { note, .. }) => {
                info!(%direction, note = %note, "History step");
                self.mirror_state().await;
            }
            // The failing moment was dropped from the log
            Err(_) => self.mirror_state().await,
        }
        result
    }

    /// Read-only copy of the undo and redo stacks
    pub fn observe_moment_log(&self) -> MomentLogSnapshot {
        self.state.read().log.snapshot()
    }

    pub fn read(&self, id: &FeatureId) -> Option<Feature> {
        self.state.read().store.get(id).cloned()
    }

    /// Every feature in insertion order
    pub fn read_all(&self) -> Vec<Feature> {
        self.state.read().store.read_all()
    }

    pub fn feature_count(&self) -> usize {
        self.state.read().store.len()
    }

    /// Bounding box of the whole document
    pub fn extent(&self) -> Option<Extent> {
        self.state.read().store.extent()
    }

    pub fn can_undo(&self) -> bool {
        self.state.read().log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.read().log.can_redo()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.bus.subscribe()
    }

    /// Consistent copy of features and history
    pub fn snapshot(&self) -> DocumentSnapshot {
        let state = self.state.read();
        DocumentSnapshot {
            features: state.store.read_all(),
            positions: state.store.positions(),
            next_position: state.store.next_position(),
            moment_log: state.log.snapshot(),
            saved_at: Some(Utc::now()),
        }
    }

    async fn mirror_state(&self) {
        let Some(mirror) = &self.mirror else {
            return;
        };

        let snapshot = self.snapshot();
        if let Err(e) = mirror.store(&snapshot).await {
            warn!(error = %e, "Failed to mirror document; in-memory state kept");
            self.bus.publish(StoreEvent::MirrorFailed {
                reason: e.to_string(),
            });
        }
    }
}
