//! Event normalization and identity keys.
//!
//! The identity key deliberately excludes time, so a pure time shift shows up
//! as a "changed" lesson rather than "removed + added".

use std::fmt::Write;

use crate::types::{Event, NormalizedEvent};

/// Case-insensitive markers of a remote-format lesson, matched against the
/// joined location text plus the online note.
const ONLINE_KEYWORDS: &[&str] = &[
    "дистанционн",
    "онлайн",
    "online",
    "коммуникационно-информационн",
    "дот",
];

/// Session-period event markers (exams, credits, project reviews), matched
/// against both kind and subject. Session events never produce change
/// notifications.
const SESSION_KEYWORDS: &[&str] = &["зачет", "зачёт", "экзамен", "показ работ", "credit", "exam"];

/// Canonicalize a raw event into its comparison-stable form.
///
/// Pure and stable: identical input always yields identical output.
pub fn normalize(event: &Event) -> NormalizedEvent {
    let educators: Vec<String> = event
        .educators
        .iter()
        .map(|e| e.display().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let locations: Vec<String> = event
        .locations
        .iter()
        .map(|l| l.display().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let haystack = format!(
        "{} {}",
        locations.join(" "),
        event.online_note.as_deref().unwrap_or("")
    )
    .to_lowercase();
    let is_online = ONLINE_KEYWORDS.iter().any(|kw| haystack.contains(kw));

    NormalizedEvent {
        date: event.day_date.clone(),
        time_start: event.start.clone().unwrap_or_default(),
        time_end: event.end.clone().unwrap_or_default(),
        time_interval: event.time_interval.clone().unwrap_or_default(),
        subject: event.subject.clone().unwrap_or_default(),
        kind: event.kind.clone().unwrap_or_default(),
        educators,
        locations,
        is_online,
    }
}

/// Identity key for "the same lesson" across schedule times.
///
/// Built from {date, subject, kind, educators, locations}; start/end are
/// excluded on purpose. Components are length-prefixed so a delimiter
/// character inside a subject or location cannot alias two distinct keys.
/// Keys are only meaningful within one group's event collection.
pub fn event_key(event: &Event) -> String {
    let n = normalize(event);
    let mut key = String::new();
    push_part(&mut key, &n.date);
    push_part(&mut key, &n.subject);
    push_part(&mut key, &n.kind);
    push_list(&mut key, &n.educators);
    push_list(&mut key, &n.locations);
    key
}

fn push_part(key: &mut String, part: &str) {
    let _ = write!(key, "{}:{};", part.len(), part);
}

fn push_list(key: &mut String, parts: &[String]) {
    let _ = write!(key, "{}#", parts.len());
    for part in parts {
        push_part(key, part);
    }
}

/// Whether an event belongs to the session (exam) period category.
pub fn is_session_event(event: &Event) -> bool {
    let kind = event.kind.as_deref().unwrap_or("").to_lowercase();
    let subject = event.subject.as_deref().unwrap_or("").to_lowercase();
    SESSION_KEYWORDS
        .iter()
        .any(|kw| kind.contains(kw) || subject.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Educator, Location};

    fn lesson() -> Event {
        Event::new("2026-09-01", "10:00", "11:30", "Statistics", "lecture")
            .with_educator("Ivanov I. I.")
            .with_location("Room 305")
    }

    #[test]
    fn test_normalize_is_stable() {
        let event = lesson();
        assert_eq!(normalize(&event), normalize(&event));
    }

    #[test]
    fn test_normalize_flattens_and_drops_empty_names() {
        let mut event = lesson();
        event.educators.push(Educator::Detailed {
            full_name: None,
            name: Some("Petrov P. P.".into()),
        });
        event.educators.push(Educator::Detailed {
            full_name: None,
            name: None,
        });
        let n = normalize(&event);
        assert_eq!(n.educators, vec!["Ivanov I. I.", "Petrov P. P."]);
    }

    #[test]
    fn test_online_flag_from_location_and_note() {
        let mut event = lesson();
        event.locations = vec![Location::Plain(
            "С использованием коммуникационно-информационных технологий".into(),
        )];
        assert!(normalize(&event).is_online);

        let mut event = lesson();
        event.online_note = Some("Занятие в формате ДОТ".into());
        assert!(normalize(&event).is_online);

        assert!(!normalize(&lesson()).is_online);
    }

    #[test]
    fn test_key_invariant_under_time_change() {
        let morning = lesson();
        let mut evening = lesson();
        evening.start = Some("18:00".into());
        evening.end = Some("19:30".into());
        evening.time_interval = Some("18:00–19:30".into());
        assert_eq!(event_key(&morning), event_key(&evening));
    }

    #[test]
    fn test_key_differs_on_subject() {
        let a = lesson();
        let mut b = lesson();
        b.subject = Some("Econometrics".into());
        assert_ne!(event_key(&a), event_key(&b));
    }

    #[test]
    fn test_key_is_delimiter_safe() {
        // A naive "|" join would make these two collide.
        let a = Event::new("2026-09-01", "10:00", "11:30", "A|B", "lecture");
        let b = Event::new("2026-09-01", "10:00", "11:30", "A", "B|lecture");
        assert_ne!(event_key(&a), event_key(&b));
    }

    #[test]
    fn test_key_separates_educators_from_locations() {
        let a = lesson().with_educator("X");
        let b = lesson().with_location("X");
        assert_ne!(event_key(&a), event_key(&b));
    }

    #[test]
    fn test_session_event_detection() {
        let mut exam = lesson();
        exam.kind = Some("Exam".into());
        assert!(is_session_event(&exam));

        let mut credit = lesson();
        credit.subject = Some("Философия (зачёт)".into());
        assert!(is_session_event(&credit));

        assert!(!is_session_event(&lesson()));
    }
}
