//! Authoritative feature map
//!
//! `FeatureStore` owns every feature of the open document. External callers
//! only read from it; mutation goes through [`Staging`], which evaluates a
//! batch sequentially against an overlay so that later operations see the
//! effect of earlier ones, and commits the overlay only if every operation
//! validated.

use std::collections::HashMap;

use tokio::sync::broadcast;
use tracing::trace;

use crate::bus::{EventBus, StoreEvent};
use crate::error::ConflictError;
use crate::feature::{Extent, Feature, FeatureId};
use crate::operation::Operation;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    feature: Feature,
}

/// Overlay of pending writes on top of the committed map
pub(crate) struct Staging<'a> {
    base: &'a HashMap<FeatureId, Entry>,
    writes: HashMap<FeatureId, Option<Feature>>,
    positions: HashMap<FeatureId, u64>,
    touched: Vec<FeatureId>,
}

struct Staged {
    writes: HashMap<FeatureId, Option<Feature>>,
    positions: HashMap<FeatureId, u64>,
    touched: Vec<FeatureId>,
}

impl<'a> Staging<'a> {
    /// Feature as it stands after the operations staged so far
    pub(crate) fn resolve(&self, id: &FeatureId) -> Option<&Feature> {
        match self.writes.get(id) {
            Some(pending) => pending.as_ref(),
            None => self.base.get(id).map(|entry| &entry.feature),
        }
    }

    /// Display position the feature will hold once the overlay commits
    ///
    /// `None` for a feature that does not resolve, or one created in this
    /// batch without a pinned position.
    pub(crate) fn position(&self, id: &FeatureId) -> Option<u64> {
        self.resolve(id)?;
        self.positions
            .get(id)
            .copied()
            .or_else(|| self.base.get(id).map(|entry| entry.seq))
    }

    /// Validate one operation against the overlay and stage its effect
    pub(crate) fn stage(&mut self, index: usize, op: &Operation) -> Result<(), ConflictError> {
        match op {
            Operation::Create { feature, position } => {
                if self.resolve(&feature.id).is_some() {
                    return Err(ConflictError::AlreadyExists {
                        id: feature.id.clone(),
                        index,
                    });
                }
                match position {
                    Some(position) => self.positions.insert(feature.id.clone(), *position),
                    None => self.positions.remove(&feature.id),
                };
                self.write(feature.id.clone(), Some(feature.clone()));
            }
            Operation::Update { id, patch } => {
                let mut feature = self
                    .resolve(id)
                    .cloned()
                    .ok_or_else(|| ConflictError::NotFound {
                        id: id.clone(),
                        index,
                    })?;
                patch.apply_to(&mut feature);
                self.write(id.clone(), Some(feature));
            }
            Operation::Delete { id } => {
                if self.resolve(id).is_none() {
                    return Err(ConflictError::NotFound {
                        id: id.clone(),
                        index,
                    });
                }
                self.positions.remove(id);
                self.write(id.clone(), None);
            }
        }
        Ok(())
    }

    fn write(&mut self, id: FeatureId, value: Option<Feature>) {
        if !self.writes.contains_key(&id) {
            self.touched.push(id.clone());
        }
        self.writes.insert(id, value);
    }

    fn finish(self) -> Staged {
        Staged {
            writes: self.writes,
            positions: self.positions,
            touched: self.touched,
        }
    }
}

/// Authoritative mapping of feature identifiers to features
#[derive(Debug)]
pub struct FeatureStore {
    features: HashMap<FeatureId, Entry>,
    next_seq: u64,
    bus: EventBus,
}

impl FeatureStore {
    /// Create an empty store publishing on `bus`
    pub fn new(bus: EventBus) -> Self {
        FeatureStore {
            features: HashMap::new(),
            next_seq: 0,
            bus,
        }
    }

    /// Create a store pre-populated with `features` (hydration)
    ///
    /// Duplicate identifiers are rejected. No change event is published.
    pub fn from_features(features: Vec<Feature>, bus: EventBus) -> Result<Self, ConflictError> {
        let mut store = Self::new(bus);
        for (index, feature) in features.into_iter().enumerate() {
            if store.features.contains_key(&feature.id) {
                return Err(ConflictError::AlreadyExists {
                    id: feature.id,
                    index,
                });
            }
            store.insert_entry(feature);
        }
        Ok(store)
    }

    /// Rebuild a store from features paired with their display positions
    ///
    /// Features past the end of `positions` are appended. `next_position` is
    /// raised above every restored position.
    pub fn from_positioned(
        features: Vec<Feature>,
        positions: &[u64],
        next_position: u64,
        bus: EventBus,
    ) -> Result<Self, ConflictError> {
        let mut store = Self::new(bus);
        store.next_seq = positions
            .iter()
            .map(|p| p + 1)
            .fold(next_position, u64::max);
        for (index, feature) in features.into_iter().enumerate() {
            if store.features.contains_key(&feature.id) {
                return Err(ConflictError::AlreadyExists {
                    id: feature.id,
                    index,
                });
            }
            match positions.get(index) {
                Some(&seq) => {
                    store.features.insert(feature.id.clone(), Entry { seq, feature });
                }
                None => store.insert_entry(feature),
            }
        }
        Ok(store)
    }

    /// Look up a feature
    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.get(id).map(|entry| &entry.feature)
    }

    pub fn contains(&self, id: &FeatureId) -> bool {
        self.features.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Identifiers in insertion order
    pub fn ids(&self) -> Vec<FeatureId> {
        self.ordered().map(|entry| entry.feature.id.clone()).collect()
    }

    /// Clones of every feature in insertion order
    pub fn read_all(&self) -> Vec<Feature> {
        self.ordered().map(|entry| entry.feature.clone()).collect()
    }

    /// Display positions matching [`FeatureStore::read_all`]
    pub fn positions(&self) -> Vec<u64> {
        self.ordered().map(|entry| entry.seq).collect()
    }

    /// Position the next appended feature will take
    pub fn next_position(&self) -> u64 {
        self.next_seq
    }

    pub(crate) fn position_of(&self, id: &FeatureId) -> Option<u64> {
        self.features.get(id).map(|entry| entry.seq)
    }

    /// Bounding box of all features
    pub fn extent(&self) -> Option<Extent> {
        Extent::of(self.features.values().map(|entry| &entry.feature))
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.bus.subscribe()
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn staging(&self) -> Staging<'_> {
        Staging {
            base: &self.features,
            writes: HashMap::new(),
            positions: HashMap::new(),
            touched: Vec::new(),
        }
    }

    /// Apply a batch all-or-nothing, returning the affected identifiers
    ///
    /// Only the transaction engine and the history controller call this.
    pub(crate) fn apply_validated(
        &mut self,
        ops: &[Operation],
    ) -> Result<Vec<FeatureId>, ConflictError> {
        let mut staging = self.staging();
        for (index, op) in ops.iter().enumerate() {
            staging.stage(index, op)?;
        }
        let staged = staging.finish();
        let touched = staged.touched.clone();

        self.commit(staged);

        if !touched.is_empty() {
            self.bus.publish(StoreEvent::FeaturesChanged {
                ids: touched.clone(),
            });
        }
        Ok(touched)
    }

    fn commit(&mut self, staged: Staged) {
        let Staged {
            mut writes,
            positions,
            touched,
        } = staged;

        for id in &touched {
            match (writes.remove(id).flatten(), positions.get(id)) {
                (Some(feature), Some(&seq)) => {
                    self.next_seq = self.next_seq.max(seq + 1);
                    self.features.insert(id.clone(), Entry { seq, feature });
                }
                (Some(feature), None) => match self.features.get_mut(id) {
                    Some(entry) => entry.feature = feature,
                    None => self.insert_entry(feature),
                },
                (None, _) => {
                    self.features.remove(id);
                }
            }
        }
        trace!(affected = touched.len(), total = self.features.len(), "Batch committed");
    }

    fn insert_entry(&mut self, feature: Feature) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.features.insert(feature.id.clone(), Entry { seq, feature });
    }

    fn ordered(&self) -> impl Iterator<Item = &Entry> {
        let mut entries: Vec<&Entry> = self.features.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter()
    }
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new(EventBus::new())
    }
}
