//! Change detection between successive session listings.

use std::collections::HashMap;

use serde::Serialize;

use crate::projection::SessionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "session", rename_all = "camelCase")]
pub enum SessionEvent {
    Added(SessionRecord),
    Removed(SessionRecord),
    Changed(SessionRecord),
}

/// Remembers the previous listing, keyed by process id. When a process has
/// several sessions only its first one is tracked.
#[derive(Debug, Default)]
pub struct SessionTracker {
    known: HashMap<u32, SessionRecord>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs `records` against the previous listing and remembers them.
    /// Added and changed events follow the order of `records`; removals come
    /// last, in process id order.
    pub fn update(&mut self, records: &[SessionRecord]) -> Vec<SessionEvent> {
        let mut current: HashMap<u32, SessionRecord> = HashMap::with_capacity(records.len());
        let mut events = Vec::new();

        for record in records {
            if current.contains_key(&record.id) {
                continue;
            }
            match self.known.get(&record.id) {
                None => events.push(SessionEvent::Added(record.clone())),
                Some(previous) if previous.volume != record.volume || previous.muted != record.muted => {
                    events.push(SessionEvent::Changed(record.clone()))
                }
                Some(_) => {}
            }
            current.insert(record.id, record.clone());
        }

        let mut removed: Vec<SessionRecord> = self
            .known
            .drain()
            .filter(|(id, _)| !current.contains_key(id))
            .map(|(_, record)| record)
            .collect();
        removed.sort_by_key(|record| record.id);
        events.extend(removed.into_iter().map(SessionEvent::Removed));

        self.known = current;
        events
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: u32, volume: u8, muted: bool) -> SessionRecord {
        SessionRecord {
            id,
            name: format!("app{id}.exe"),
            display_name: format!("App {id}"),
            volume,
            muted,
        }
    }

    #[test]
    fn first_listing_reports_everything_added() {
        let mut tracker = SessionTracker::new();
        let events = tracker.update(&[record(1, 50, false), record(2, 80, true)]);
        assert_eq!(
            events,
            vec![
                SessionEvent::Added(record(1, 50, false)),
                SessionEvent::Added(record(2, 80, true)),
            ]
        );
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn reports_changes_and_removals() {
        let mut tracker = SessionTracker::new();
        tracker.update(&[record(1, 50, false), record(2, 80, false), record(3, 10, false)]);

        let events = tracker.update(&[record(1, 50, true), record(3, 10, false), record(4, 30, false)]);
        assert_eq!(
            events,
            vec![
                SessionEvent::Changed(record(1, 50, true)),
                SessionEvent::Added(record(4, 30, false)),
                SessionEvent::Removed(record(2, 80, false)),
            ]
        );
    }

    #[test]
    fn unchanged_listing_is_quiet() {
        let mut tracker = SessionTracker::new();
        tracker.update(&[record(1, 50, false)]);
        assert!(tracker.update(&[record(1, 50, false), record(1, 20, false)]).is_empty());
        assert!(tracker.update(&[]).len() == 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn events_serialize_tagged() {
        let value = serde_json::to_value(SessionEvent::Removed(record(7, 40, false))).unwrap();
        assert_eq!(value["event"], "removed");
        assert_eq!(value["session"]["displayName"], "App 7");
    }
}
