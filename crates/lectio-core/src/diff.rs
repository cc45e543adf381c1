//! Schedule comparison: classify lessons as added, removed, or changed.

use std::collections::HashMap;

use crate::normalize::{event_key, normalize};
use crate::types::{ChangeField, Event, NormalizedEvent};

/// Result of comparing two event collections. Buckets are unordered sets;
/// callers must not rely on enumeration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleDiff {
    pub added: Vec<Event>,
    pub removed: Vec<Event>,
    pub changed: Vec<ChangedEvent>,
}

impl ScheduleDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of diff entries across all buckets.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// A lesson whose identity key survived but whose fields moved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedEvent {
    pub old: Event,
    pub new: Event,
    pub changes: Vec<ChangeField>,
}

/// Compare two event collections keyed by lesson identity.
///
/// Keys present only in `new` are added, only in `old` are removed; keys on
/// both sides are compared field-wise on the normalized form (time pair,
/// educators, locations, online flag — list equality is order-sensitive).
/// A key with zero field differences lands in no bucket.
pub fn compare(old_events: &[Event], new_events: &[Event]) -> ScheduleDiff {
    let old = index(old_events);
    let new = index(new_events);

    let mut diff = ScheduleDiff::default();

    for (key, (event, _)) in &new {
        if !old.contains_key(key) {
            diff.added.push((*event).clone());
        }
    }
    for (key, (event, _)) in &old {
        if !new.contains_key(key) {
            diff.removed.push((*event).clone());
        }
    }
    for (key, (old_event, old_norm)) in &old {
        let Some((new_event, new_norm)) = new.get(key) else {
            continue;
        };
        let changes = field_changes(old_norm, new_norm);
        if !changes.is_empty() {
            diff.changed.push(ChangedEvent {
                old: (*old_event).clone(),
                new: (*new_event).clone(),
                changes,
            });
        }
    }

    diff
}

/// Index one side by identity key, normalizing once per event.
///
/// Known limitation: the key excludes time, so two otherwise identical
/// lessons on the same day collide and only the first occurrence survives.
/// Accepted by the key design rather than silently "fixed".
fn index(events: &[Event]) -> HashMap<String, (&Event, NormalizedEvent)> {
    let mut map = HashMap::new();
    for event in events {
        map.entry(event_key(event))
            .or_insert_with(|| (event, normalize(event)));
    }
    map
}

fn field_changes(old: &NormalizedEvent, new: &NormalizedEvent) -> Vec<ChangeField> {
    let mut changes = Vec::new();
    if old.time_start != new.time_start || old.time_end != new.time_end {
        changes.push(ChangeField::Time);
    }
    if old.educators != new.educators {
        changes.push(ChangeField::Educator);
    }
    if old.locations != new.locations {
        changes.push(ChangeField::Location);
    }
    if old.is_online != new.is_online {
        changes.push(ChangeField::Format);
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(subject: &str, start: &str) -> Event {
        let end = format!("{}:30", &start[..2]);
        Event::new("2026-09-01", start, &end, subject, "lecture")
            .with_educator("Ivanov I. I.")
            .with_location("Room 305")
    }

    #[test]
    fn test_compare_reflexive() {
        let events = vec![lesson("Math", "10:00"), lesson("History", "12:00")];
        assert!(compare(&events, &events).is_empty());
    }

    #[test]
    fn test_compare_added_removed_symmetry() {
        let old = vec![lesson("Math", "10:00")];
        let new = vec![lesson("Math", "10:00"), lesson("History", "12:00")];
        let forward = compare(&old, &new);
        let backward = compare(&new, &old);
        assert_eq!(forward.added, backward.removed);
        assert_eq!(forward.removed, backward.added);
    }

    #[test]
    fn test_time_shift_is_changed_not_readded() {
        let old = vec![lesson("Math", "10:00")];
        let mut moved = lesson("Math", "10:00");
        moved.start = Some("12:00".into());
        moved.end = Some("13:30".into());
        let new = vec![moved];

        let diff = compare(&old, &new);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].changes, vec![ChangeField::Time]);
        assert_eq!(diff.changed[0].old.start.as_deref(), Some("10:00"));
        assert_eq!(diff.changed[0].new.start.as_deref(), Some("12:00"));
    }

    #[test]
    fn test_multiple_change_reasons_tagged() {
        // Time and format are outside the identity key, so both moving at
        // once is one changed entry with two reasons.
        let old = vec![lesson("Math", "10:00")];
        let mut new_event = lesson("Math", "10:00");
        new_event.start = Some("12:00".into());
        new_event.end = Some("13:30".into());
        new_event.online_note = Some("онлайн".into());
        let diff = compare(&old, &[new_event]);
        assert_eq!(
            diff.changed[0].changes,
            vec![ChangeField::Time, ChangeField::Format]
        );
    }

    #[test]
    fn test_educator_swap_changes_identity() {
        // Educators are part of the key: replacing one is a removed+added
        // pair, not a changed entry.
        let old = vec![lesson("Math", "10:00")];
        let mut new_event = lesson("Math", "10:00");
        new_event.educators.clear();
        new_event = new_event.with_educator("Petrov P. P.");
        let diff = compare(&old, &[new_event]);
        assert!(diff.changed.is_empty());
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
    }

    #[test]
    fn test_format_change_tagged() {
        let old = vec![lesson("Math", "10:00")];
        let mut new_event = lesson("Math", "10:00");
        new_event.online_note = Some("онлайн".into());
        let diff = compare(&old, &[new_event]);
        assert_eq!(diff.changed[0].changes, vec![ChangeField::Format]);
    }

    #[test]
    fn test_reordered_collection_is_a_noop() {
        let a = lesson("Math", "10:00");
        let b = lesson("History", "12:00");
        let diff = compare(&[a.clone(), b.clone()], &[b, a]);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_duplicate_key_keeps_one_representative() {
        // Same lesson twice at different times: keys collide by design and
        // the first occurrence wins within each side.
        let first = lesson("Math", "10:00");
        let mut second = lesson("Math", "10:00");
        second.start = Some("14:00".into());
        second.end = Some("15:30".into());

        let diff = compare(&[], &[first.clone(), second]);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0], first);
    }
}
