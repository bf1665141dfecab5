//! Audit history entries.
//!
//! History is independent of undo/redo: every state-changing action gets an
//! entry, undoable or not. Entries tied to an undoable action carry its
//! `action_id` so undo can retract them and redo can replay them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Role;
use crate::{ActionId, HistoryEventId, LevelId};

/// Who performed an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryActor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// A position on a specific level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRef {
    pub level_id: LevelId,
    pub x: i32,
    pub y: i32,
}

/// One field's before/after value, already rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: String,
    pub to: String,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} → {}", self.field, self.from, self.to)
    }
}

/// Structured details attached to a history entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<PositionRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PositionRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

impl HistoryDetails {
    pub fn target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn with_from(mut self, from: PositionRef) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_to(mut self, to: PositionRef) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }
}

/// A DM-visible audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub id: HistoryEventId,
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub description: String,
    pub actor: HistoryActor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,
    #[serde(default)]
    pub details: HistoryDetails,
}

impl HistoryEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        actor: HistoryActor,
        action_type: impl Into<String>,
        description: impl Into<String>,
        details: HistoryDetails,
        action_id: Option<ActionId>,
    ) -> Self {
        Self {
            id: HistoryEventId::new(),
            timestamp,
            action_type: action_type.into(),
            description: description.into(),
            actor,
            action_id,
            details,
        }
    }
}

/// Join field changes into a compact description, e.g. `"HP 10 → 7, AC 12 → 14"`.
pub fn describe_changes(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_changes_with_arrows() {
        let changes = vec![
            FieldChange::new("HP", "10", "7"),
            FieldChange::new("AC", "12", "14"),
        ];
        assert_eq!(describe_changes(&changes), "HP 10 → 7, AC 12 → 14");
    }

    #[test]
    fn empty_details_are_omitted_on_the_wire() {
        let json = serde_json::to_value(HistoryDetails::target("Goblin")).expect("serialize");
        assert_eq!(json, serde_json::json!({"target": "Goblin"}));
    }
}
