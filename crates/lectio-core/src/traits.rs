//! Seam traits for the external collaborators.
//!
//! Everything is constructed once at process start and passed by `Arc`; no
//! ambient global handles.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Event;

/// Upstream timetable source, one windowed fetch per group.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Events in the regular watch window (today + configured days).
    async fn regular_events(&self, group_id: i64) -> Result<Vec<Event>>;

    /// Session-category events in the extended exam window.
    async fn session_events(&self, group_id: i64) -> Result<Vec<Event>>;
}

/// Outcome of one delivery attempt through the messaging sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Recipient unreachable (blocked the bot). Permanent — never retried,
    /// never escalated.
    Forbidden,
    /// Transient failure. Logged by the sink; eligible again next cycle.
    Failed,
}

/// Messaging sink for user-facing notifications.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, chat_id: i64, text: &str) -> Delivery;
}
