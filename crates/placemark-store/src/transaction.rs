//! Transaction engine: validate, invert, apply, record

use tracing::{debug, info};

use crate::bus::StoreEvent;
use crate::error::{ConflictError, StoreError, StoreResult};
use crate::moment::{Moment, MomentLog};
use crate::operation::Operation;
use crate::store::FeatureStore;

/// Applies named operation batches and records them as moments
pub struct TransactionEngine;

impl TransactionEngine {
    /// Compute the operations that undo `ops` against the current store state
    ///
    /// Pre-images are read before any mutation. Operations are evaluated in
    /// order, so the inverse of a later operation sees the effect of earlier
    /// ones. The result is in reverse order of `ops`. Re-creations carry the
    /// deleted feature's display position.
    pub fn invert(store: &FeatureStore, ops: &[Operation]) -> Result<Vec<Operation>, ConflictError> {
        let mut staging = store.staging();
        let mut inverse = Vec::with_capacity(ops.len());

        for (index, op) in ops.iter().enumerate() {
            let undo = match op {
                Operation::Create { feature, .. } => Operation::delete(feature.id.clone()),
                Operation::Update { id, patch } => {
                    let prior = staging.resolve(id).ok_or_else(|| ConflictError::NotFound {
                        id: id.clone(),
                        index,
                    })?;
                    Operation::update(id.clone(), patch.inverse_against(prior))
                }
                Operation::Delete { id } => {
                    let prior = staging.resolve(id).cloned().ok_or_else(|| {
                        ConflictError::NotFound {
                            id: id.clone(),
                            index,
                        }
                    })?;
                    match staging.position(id) {
                        Some(position) => Operation::create_at(prior, position),
                        None => Operation::create(prior),
                    }
                }
            };
            staging.stage(index, op)?;
            inverse.push(undo);
        }

        inverse.reverse();
        Ok(inverse)
    }

    /// Apply `ops` atomically and push the resulting moment onto the undo stack
    ///
    /// On any error neither the store nor the log changes.
    pub fn transact(
        store: &mut FeatureStore,
        log: &mut MomentLog,
        note: impl Into<String>,
        mut ops: Vec<Operation>,
    ) -> StoreResult<Moment> {
        let note = note.into();
        if ops.is_empty() {
            return Err(StoreError::validation_error(format!(
                "transaction \"{}\" has no operations",
                note
            )));
        }

        let inverse_ops = Self::invert(store, &ops)?;
        let affected = store.apply_validated(&ops)?;
        debug!(note = %note, ops = ops.len(), affected = affected.len(), "Transaction applied");
        pin_created(store, &mut ops);

        let moment = Moment::new(note, ops, inverse_ops);
        log.record_new(moment.clone());
        store.bus().publish(StoreEvent::MomentRecorded {
            note: moment.note.clone(),
        });

        info!(note = %moment.note, undo_depth = log.undo_len(), "Moment recorded");
        Ok(moment)
    }
}

// Redo re-creates features in the slots they took on first apply
fn pin_created(store: &FeatureStore, ops: &mut [Operation]) {
    for op in ops.iter_mut() {
        if let Operation::Create { feature, position } = op {
            if position.is_none() {
                *position = store.position_of(&feature.id);
            }
        }
    }
}
