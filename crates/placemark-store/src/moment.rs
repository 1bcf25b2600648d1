//! Moments and the undo/redo moment log

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feature::FeatureId;
use crate::history::Direction;
use crate::operation::Operation;

/// One reversible transaction record stored in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    /// Unique identifier for this moment
    pub id: String,
    /// Human-readable description shown in history navigation
    pub note: String,
    /// Operations that produced the state change
    pub forward_ops: Vec<Operation>,
    /// Operations that exactly undo `forward_ops`
    pub inverse_ops: Vec<Operation>,
    /// When the moment was recorded
    pub created_at: DateTime<Utc>,
}

impl Moment {
    pub(crate) fn new(
        note: impl Into<String>,
        forward_ops: Vec<Operation>,
        inverse_ops: Vec<Operation>,
    ) -> Self {
        Moment {
            id: Uuid::new_v4().to_string(),
            note: note.into(),
            forward_ops,
            inverse_ops,
            created_at: Utc::now(),
        }
    }

    /// Distinct identifiers touched by the forward operations, in order
    pub fn affected_ids(&self) -> Vec<FeatureId> {
        let mut ids: Vec<FeatureId> = Vec::new();
        for op in &self.forward_ops {
            if !ids.contains(op.target()) {
                ids.push(op.target().clone());
            }
        }
        ids
    }

    /// Operations to replay for a traversal in `direction`
    pub fn ops_for(&self, direction: Direction) -> &[Operation] {
        match direction {
            Direction::Undo => &self.inverse_ops,
            Direction::Redo => &self.forward_ops,
        }
    }
}

/// Undo and redo stacks over moments, both most-recent-last
#[derive(Debug, Clone, Default)]
pub struct MomentLog {
    undo: VecDeque<Moment>,
    redo: Vec<Moment>,
    max_undo: Option<usize>,
}

impl MomentLog {
    /// Unbounded log
    pub fn new() -> Self {
        Self::default()
    }

    /// Log keeping at most `max_undo` undo entries, evicting the oldest first
    pub fn with_max_undo(max_undo: Option<usize>) -> Self {
        MomentLog {
            max_undo,
            ..Self::default()
        }
    }

    /// Rebuild a log from a snapshot, applying the capacity bound
    pub fn from_snapshot(snapshot: MomentLogSnapshot, max_undo: Option<usize>) -> Self {
        let mut log = MomentLog {
            undo: snapshot.undo.into(),
            redo: snapshot.redo,
            max_undo,
        };
        log.evict();
        log
    }

    /// Record a moment produced by a new transaction
    pub fn record_new(&mut self, moment: Moment) {
        self.undo.push_back(moment);
        self.redo.clear();
        self.evict();
    }

    /// Pop the most recent undoable moment
    pub fn take_for_undo(&mut self) -> Option<Moment> {
        self.undo.pop_back()
    }

    /// Pop the most recent redoable moment
    pub fn take_for_redo(&mut self) -> Option<Moment> {
        self.redo.pop()
    }

    /// Push a moment that was just undone
    pub fn push_to_redo(&mut self, moment: Moment) {
        self.redo.push(moment);
    }

    /// Push a moment that was just redone
    pub fn push_to_undo(&mut self, moment: Moment) {
        self.undo.push_back(moment);
        self.evict();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Read-only copy of both stacks
    pub fn snapshot(&self) -> MomentLogSnapshot {
        MomentLogSnapshot {
            undo: self.undo.iter().cloned().collect(),
            redo: self.redo.clone(),
        }
    }

    fn evict(&mut self) {
        if let Some(max) = self.max_undo {
            while self.undo.len() > max {
                if let Some(evicted) = self.undo.pop_front() {
                    tracing::debug!(note = %evicted.note, "Evicted oldest undo entry");
                }
            }
        }
    }
}

/// Entry of the history navigation list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEntry {
    /// A moment reachable by `steps` sequential traversals in `direction`
    Moment {
        direction: Direction,
        note: String,
        steps: usize,
    },
    /// Marker for the present state between the undo and redo entries
    Current,
}

/// Read-only snapshot of the moment log, both stacks most-recent-last
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentLogSnapshot {
    pub undo: Vec<Moment>,
    pub redo: Vec<Moment>,
}

impl MomentLogSnapshot {
    /// Notes of the undo stack, oldest first
    pub fn undo_notes(&self) -> Vec<&str> {
        self.undo.iter().map(|m| m.note.as_str()).collect()
    }

    /// Notes of the redo stack, most recent last
    pub fn redo_notes(&self) -> Vec<&str> {
        self.redo.iter().map(|m| m.note.as_str()).collect()
    }

    /// Navigation list: undo entries oldest first, the current marker, then
    /// redo entries nearest first
    ///
    /// `steps` is how many single undo/redo calls land on the state just
    /// before (undo) or just after (redo) the entry's moment.
    pub fn navigation(&self) -> Vec<NavigationEntry> {
        let undo_len = self.undo.len();
        let mut entries = Vec::with_capacity(undo_len + self.redo.len() + 1);

        for (k, moment) in self.undo.iter().enumerate() {
            entries.push(NavigationEntry::Moment {
                direction: Direction::Undo,
                note: moment.note.clone(),
                steps: undo_len - k,
            });
        }
        entries.push(NavigationEntry::Current);
        for (i, moment) in self.redo.iter().rev().enumerate() {
            entries.push(NavigationEntry::Moment {
                direction: Direction::Redo,
                note: moment.note.clone(),
                steps: i + 1,
            });
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moment(note: &str) -> Moment {
        Moment::new(note, vec![Operation::delete(note)], Vec::new())
    }

    #[test]
    fn test_record_new_clears_redo() {
        let mut log = MomentLog::new();
        log.record_new(moment("a"));
        let undone = log.take_for_undo().unwrap();
        log.push_to_redo(undone);
        assert!(log.can_redo());

        log.record_new(moment("b"));
        assert!(!log.can_redo());
        assert_eq!(log.undo_len(), 1);
    }

    #[test]
    fn test_take_on_empty_stacks_is_noop() {
        let mut log = MomentLog::new();
        assert!(log.take_for_undo().is_none());
        assert!(log.take_for_redo().is_none());
        assert_eq!(log.undo_len(), 0);
        assert_eq!(log.redo_len(), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest_undo_entries() {
        let mut log = MomentLog::with_max_undo(Some(2));
        log.record_new(moment("a"));
        log.record_new(moment("b"));
        log.record_new(moment("c"));

        assert_eq!(log.snapshot().undo_notes(), vec!["b", "c"]);
    }

    #[test]
    fn test_from_snapshot_applies_capacity() {
        let snapshot = MomentLogSnapshot {
            undo: vec![moment("a"), moment("b"), moment("c")],
            redo: vec![moment("d")],
        };
        let log = MomentLog::from_snapshot(snapshot, Some(1));
        assert_eq!(log.snapshot().undo_notes(), vec!["c"]);
        assert_eq!(log.redo_len(), 1);
    }

    #[test]
    fn test_navigation_steps() {
        let mut log = MomentLog::new();
        for note in ["a", "b", "c", "d"] {
            log.record_new(moment(note));
        }
        // undo d then c: redo stack is [d, c], next redo is c
        for _ in 0..2 {
            let m = log.take_for_undo().unwrap();
            log.push_to_redo(m);
        }

        let nav = log.snapshot().navigation();
        let expected = vec![
            NavigationEntry::Moment {
                direction: Direction::Undo,
                note: "a".to_string(),
                steps: 2,
            },
            NavigationEntry::Moment {
                direction: Direction::Undo,
                note: "b".to_string(),
                steps: 1,
            },
            NavigationEntry::Current,
            NavigationEntry::Moment {
                direction: Direction::Redo,
                note: "c".to_string(),
                steps: 1,
            },
            NavigationEntry::Moment {
                direction: Direction::Redo,
                note: "d".to_string(),
                steps: 2,
            },
        ];
        assert_eq!(nav, expected);
    }

    #[test]
    fn test_affected_ids_are_distinct() {
        let m = Moment::new(
            "batch",
            vec![
                Operation::delete("a"),
                Operation::delete("b"),
                Operation::delete("a"),
            ],
            Vec::new(),
        );
        assert_eq!(m.affected_ids(), vec![FeatureId::from("a"), FeatureId::from("b")]);
    }
}
