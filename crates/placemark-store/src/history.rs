//! History traversal over the moment log

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::bus::StoreEvent;
use crate::error::{StoreError, StoreResult};
use crate::feature::FeatureId;
use crate::moment::MomentLog;
use crate::store::FeatureStore;

/// Direction of a history step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Undo,
    Redo,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Undo => write!(f, "undo"),
            Direction::Redo => write!(f, "redo"),
        }
    }
}

/// Result of a single history step
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    /// A moment was replayed
    Applied {
        direction: Direction,
        note: String,
        affected: Vec<FeatureId>,
    },
    /// The relevant stack was empty; nothing changed
    NothingToDo,
}

impl HistoryOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, HistoryOutcome::Applied { .. })
    }
}

/// Replays moments without recording new history
pub struct HistoryController;

impl HistoryController {
    /// Revert the most recent moment
    pub fn undo(store: &mut FeatureStore, log: &mut MomentLog) -> StoreResult<HistoryOutcome> {
        Self::step(store, log, Direction::Undo)
    }

    /// Reapply the most recently undone moment
    pub fn redo(store: &mut FeatureStore, log: &mut MomentLog) -> StoreResult<HistoryOutcome> {
        Self::step(store, log, Direction::Redo)
    }

    /// One traversal step in `direction`
    ///
    /// A moment whose operations no longer apply is dropped and reported as
    /// [`StoreError::HistoryCorruption`].
    pub fn step(
        store: &mut FeatureStore,
        log: &mut MomentLog,
        direction: Direction,
    ) -> StoreResult<HistoryOutcome> {
        let taken = match direction {
            Direction::Undo => log.take_for_undo(),
            Direction::Redo => log.take_for_redo(),
        };
        let Some(moment) = taken else {
            debug!(%direction, "Nothing to {}", direction);
            return Ok(HistoryOutcome::NothingToDo);
        };

        let affected = match store.apply_validated(moment.ops_for(direction)) {
            Ok(affected) => affected,
            Err(source) => {
                let err = StoreError::HistoryCorruption {
                    direction,
                    note: moment.note.clone(),
                    source,
                };
                error!(
                    %direction,
                    note = %moment.note,
                    error = %placemark_common::format_error(&err),
                    "Moment dropped: log and store diverged"
                );
                return Err(err);
            }
        };

        let note = moment.note.clone();
        match direction {
            Direction::Undo => log.push_to_redo(moment),
            Direction::Redo => log.push_to_undo(moment),
        }

        store.bus().publish(StoreEvent::HistoryTraversed {
            direction,
            note: note.clone(),
        });
        debug!(%direction, note = %note, affected = affected.len(), "History step applied");

        Ok(HistoryOutcome::Applied {
            direction,
            note,
            affected,
        })
    }
}
