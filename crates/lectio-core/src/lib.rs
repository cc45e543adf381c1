//! # Lectio Core
//!
//! Domain types, configuration, and the pure schedule-comparison pipeline:
//!
//! ```text
//! raw Event ──normalize──▶ NormalizedEvent ──event_key──▶ identity key
//!                                   │
//!                    compare(old, new) ──▶ ScheduleDiff {added, removed, changed}
//! ```
//!
//! Everything here is side-effect free. I/O lives in the sibling crates
//! (`lectio-api`, `lectio-store`, `lectio-channels`) behind the seam traits
//! in [`traits`].

pub mod config;
pub mod diff;
pub mod error;
pub mod normalize;
pub mod traits;
pub mod types;

pub use config::LectioConfig;
pub use diff::{ChangedEvent, ScheduleDiff, compare};
pub use error::{LectioError, Result};
pub use normalize::{event_key, is_session_event, normalize};
pub use traits::{Delivery, MessageSink, ScheduleSource};
pub use types::{
    ChangeField, ChangeKind, Event, NormalizedEvent, NoticePayload, SnapshotKind, Subscription,
};
