//! Bounded undo/redo stacks of before/after snapshots.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use mapkeep_domain::{ActionId, GameSnapshot, HistoryEvent};
use mapkeep_shared::UndoRedoState;

/// One reversible operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSnapshot {
    pub id: ActionId,
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub description: String,
    pub before: GameSnapshot,
    pub after: GameSnapshot,
    /// History entries recorded with this action, replayed on redo
    pub history: Vec<HistoryEvent>,
}

#[derive(Debug)]
pub struct UndoStack {
    undo: VecDeque<ActionSnapshot>,
    redo: Vec<ActionSnapshot>,
    max: usize,
}

impl UndoStack {
    pub fn new(max: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max: max.max(1),
        }
    }

    /// Record a fresh action. Clears redo and drops the oldest entries past
    /// the cap.
    pub fn push(&mut self, action: ActionSnapshot) {
        self.redo.clear();
        self.push_undo(action);
    }

    /// Put an action back on the undo stack without touching redo.
    pub fn push_undo(&mut self, action: ActionSnapshot) {
        self.undo.push_back(action);
        self.trim();
    }

    pub fn pop_undo(&mut self) -> Option<ActionSnapshot> {
        self.undo.pop_back()
    }

    pub fn push_redo(&mut self, action: ActionSnapshot) {
        self.redo.push(action);
        if self.redo.len() > self.max {
            let excess = self.redo.len() - self.max;
            self.redo.drain(..excess);
        }
    }

    pub fn pop_redo(&mut self) -> Option<ActionSnapshot> {
        self.redo.pop()
    }

    pub fn state(&self) -> UndoRedoState {
        UndoRedoState::new(self.undo.len(), self.redo.len())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Drop the oldest entries past the cap. Returns how many were dropped.
    pub fn trim(&mut self) -> usize {
        let mut dropped = 0;
        while self.undo.len() > self.max {
            self.undo.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Returns how many redo entries were dropped.
    pub fn drop_redo(&mut self) -> usize {
        let dropped = self.redo.len();
        self.redo.clear();
        dropped
    }

    pub fn shrink_to_fit(&mut self) {
        self.undo.shrink_to_fit();
        self.redo.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.undo.len() + self.redo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty() && self.redo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(n: usize) -> ActionSnapshot {
        ActionSnapshot {
            id: ActionId::new(),
            timestamp: Utc::now(),
            action_type: "paintFloor".to_string(),
            description: format!("action {n}"),
            before: GameSnapshot::default(),
            after: GameSnapshot::default(),
            history: Vec::new(),
        }
    }

    #[test]
    fn keeps_the_most_recent_entries_past_the_cap() {
        let mut stack = UndoStack::new(50);
        for n in 0..51 {
            stack.push(action(n));
        }
        assert_eq!(stack.state().undo_count, 50);
        let newest = stack.pop_undo().expect("newest");
        assert_eq!(newest.description, "action 50");
        let mut oldest = newest;
        while let Some(next) = stack.pop_undo() {
            oldest = next;
        }
        assert_eq!(oldest.description, "action 1");
    }

    #[test]
    fn push_clears_redo_but_push_undo_keeps_it() {
        let mut stack = UndoStack::new(10);
        stack.push(action(0));
        stack.push(action(1));
        let undone = stack.pop_undo().expect("undo");
        stack.push_redo(undone);
        assert_eq!(stack.state(), UndoRedoState::new(1, 1));

        let redone = stack.pop_redo().expect("redo");
        stack.push_undo(redone);
        assert_eq!(stack.state(), UndoRedoState::new(2, 0));

        let undone = stack.pop_undo().expect("undo");
        stack.push_redo(undone);
        stack.push(action(2));
        assert_eq!(stack.state(), UndoRedoState::new(2, 0));
    }

    #[test]
    fn drop_redo_and_clear() {
        let mut stack = UndoStack::new(10);
        stack.push(action(0));
        let undone = stack.pop_undo().expect("undo");
        stack.push_redo(undone);
        assert_eq!(stack.drop_redo(), 1);
        assert!(stack.is_empty());
        stack.push(action(1));
        stack.clear();
        assert_eq!(stack.len(), 0);
    }
}
