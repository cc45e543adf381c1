//! Domain types shared across the workspace.

use serde::{Deserialize, Serialize};

/// A raw study event as returned by the timetable API.
///
/// Immutable once fetched; carries no identity beyond its fields. The
/// upstream payload is inconsistent between endpoints (educators arrive
/// either as records or plain strings, locations likewise), so the dual
/// shapes are modelled with untagged enums and flattened only during
/// normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(rename = "DayDate")]
    pub day_date: String,
    #[serde(rename = "Start")]
    pub start: Option<String>,
    #[serde(rename = "End")]
    pub end: Option<String>,
    #[serde(rename = "TimeIntervalString")]
    pub time_interval: Option<String>,
    #[serde(rename = "Subject")]
    pub subject: Option<String>,
    #[serde(rename = "Kind")]
    pub kind: Option<String>,
    #[serde(
        rename = "Educators",
        alias = "EducatorIds",
        deserialize_with = "null_default"
    )]
    pub educators: Vec<Educator>,
    #[serde(
        rename = "EventLocations",
        alias = "Locations",
        deserialize_with = "null_default"
    )]
    pub locations: Vec<Location>,
    #[serde(rename = "OnlineNote")]
    pub online_note: Option<String>,
}

impl Event {
    /// Convenience constructor for fixtures and tests.
    pub fn new(day_date: &str, start: &str, end: &str, subject: &str, kind: &str) -> Self {
        Self {
            day_date: day_date.into(),
            start: Some(start.into()),
            end: Some(end.into()),
            time_interval: Some(format!("{start}–{end}")),
            subject: Some(subject.into()),
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    pub fn with_educator(mut self, name: &str) -> Self {
        self.educators.push(Educator::Plain(name.into()));
        self
    }

    pub fn with_location(mut self, display: &str) -> Self {
        self.locations.push(Location::Plain(display.into()));
        self
    }
}

/// Upstream sends `null` where an empty list is meant.
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An instructor reference: either a full record or a bare name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Educator {
    Detailed {
        #[serde(rename = "FullName", default, skip_serializing_if = "Option::is_none")]
        full_name: Option<String>,
        #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Plain(String),
}

impl Educator {
    /// The displayable name; empty string when the record carries none.
    pub fn display(&self) -> &str {
        match self {
            Educator::Detailed { full_name, name } => full_name
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| name.as_deref().filter(|s| !s.is_empty()))
                .unwrap_or(""),
            Educator::Plain(s) => s,
        }
    }
}

/// A location descriptor: either a full record or a bare string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Detailed {
        #[serde(rename = "DisplayName", default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(rename = "Address", default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
    Plain(String),
}

impl Location {
    pub fn display(&self) -> &str {
        match self {
            Location::Detailed {
                display_name,
                address,
            } => display_name
                .as_deref()
                .filter(|s| !s.is_empty())
                .or_else(|| address.as_deref().filter(|s| !s.is_empty()))
                .unwrap_or(""),
            Location::Plain(s) => s,
        }
    }
}

/// Comparison-stable view of an [`Event`]. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub date: String,
    pub time_start: String,
    pub time_end: String,
    /// Raw time-range text, kept as a fallback when start/end are absent.
    pub time_interval: String,
    pub subject: String,
    pub kind: String,
    /// Flattened instructor names, API order preserved.
    pub educators: Vec<String>,
    /// Flattened location descriptors, API order preserved.
    pub locations: Vec<String>,
    pub is_online: bool,
}

/// Which snapshot a group's stored event collection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// The near-term window watched for change notifications.
    Regular,
    /// The extended exam-period window, probed less frequently.
    Session,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Regular => "regular",
            SnapshotKind::Session => "session",
        }
    }
}

/// What happened to a lesson between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// Which normalized field differed for a `Changed` lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeField {
    Time,
    Educator,
    Location,
    Format,
}

/// Logical content of one notification, hashed together with the user id
/// into the dedup fingerprint. Field order is fixed by the struct, so the
/// serialized form (and therefore the digest) is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticePayload {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub event_key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ChangeField>,
}

impl NoticePayload {
    pub fn new(kind: ChangeKind, event_key: String) -> Self {
        Self {
            kind,
            event_key,
            changes: Vec::new(),
        }
    }

    pub fn with_changes(mut self, changes: Vec<ChangeField>) -> Self {
        self.changes = changes;
        self
    }
}

/// One user's group subscription, as read from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub user_id: i64,
    pub group_id: i64,
    /// Display name for message text; not a source of truth.
    pub group_name: String,
    pub notifications_enabled: bool,
}
