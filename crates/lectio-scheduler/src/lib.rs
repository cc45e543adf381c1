//! # Lectio Scheduler
//!
//! The change-detection loop:
//!
//! ```text
//! ScheduleWatcher (tokio interval / manual trigger)
//!   ├── per group: fetch regular window → hash gate → diff → notify
//!   │                └── Notifier → dedup ledger → MessageSink
//!   ├── throttled session-window probe (health only, 6h cooldown)
//!   └── health state: last_schedule_check / last_session_check / last_error
//! ```
//!
//! Cycles are not mutually excluded: a manual trigger racing the timer is
//! tolerated because snapshot writes are idempotent upserts and delivery is
//! dedup-gated.

pub mod format;
pub mod notifier;
pub mod watcher;

pub use notifier::Notifier;
pub use watcher::{CheckReport, ScheduleWatcher, spawn_watcher};

#[cfg(test)]
pub(crate) mod testutil;
