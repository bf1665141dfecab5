//! DM-only audit log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use mapkeep_domain::{ActionId, HistoryEvent, HistoryEventId};

/// Capped, append-only log of history entries.
#[derive(Debug)]
pub struct HistoryLog {
    events: VecDeque<HistoryEvent>,
    max: usize,
}

impl HistoryLog {
    pub fn new(max: usize) -> Self {
        Self {
            events: VecDeque::new(),
            max: max.max(1),
        }
    }

    pub fn record(&mut self, event: HistoryEvent) {
        self.events.push_back(event);
        self.trim();
    }

    /// Remove every entry tied to an action. Returns the removed ids.
    pub fn remove_action(&mut self, action_id: &ActionId) -> Vec<HistoryEventId> {
        let mut removed = Vec::new();
        self.events.retain(|event| {
            if event.action_id.as_ref() == Some(action_id) {
                removed.push(event.id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Re-append entries with fresh timestamps. Returns what was appended.
    pub fn replay(&mut self, events: &[HistoryEvent], now: DateTime<Utc>) -> Vec<HistoryEvent> {
        let replayed: Vec<HistoryEvent> = events
            .iter()
            .cloned()
            .map(|mut event| {
                event.timestamp = now;
                event
            })
            .collect();
        self.events.extend(replayed.iter().cloned());
        self.trim();
        replayed
    }

    pub fn snapshot(&self) -> Vec<HistoryEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns how many entries were dropped.
    pub fn trim(&mut self) -> usize {
        let excess = self.events.len().saturating_sub(self.max);
        self.events.drain(..excess);
        excess
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        self.events.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mapkeep_domain::{HistoryActor, HistoryDetails, Role};

    fn entry(action_id: Option<ActionId>) -> HistoryEvent {
        HistoryEvent::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date"),
            HistoryActor {
                id: "dm".to_string(),
                name: "DM".to_string(),
                role: Role::Dm,
            },
            "paintFloor",
            "Painted 1 cell",
            HistoryDetails::default(),
            action_id,
        )
    }

    #[test]
    fn trims_oldest_past_cap() {
        let mut log = HistoryLog::new(3);
        let first = entry(None);
        let first_id = first.id.clone();
        log.record(first);
        for _ in 0..3 {
            log.record(entry(None));
        }
        assert_eq!(log.len(), 3);
        assert!(log.snapshot().iter().all(|e| e.id != first_id));
    }

    #[test]
    fn remove_then_replay_action() {
        let mut log = HistoryLog::new(10);
        let action = ActionId::new();
        log.record(entry(None));
        log.record(entry(Some(action.clone())));

        let tied: Vec<HistoryEvent> = log
            .snapshot()
            .into_iter()
            .filter(|e| e.action_id.as_ref() == Some(&action))
            .collect();
        let removed = log.remove_action(&action);
        assert_eq!(removed, vec![tied[0].id.clone()]);
        assert_eq!(log.len(), 1);

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid date");
        let replayed = log.replay(&tied, now);
        assert_eq!(replayed[0].timestamp, now);
        assert_eq!(log.len(), 2);
    }
}
