//! Turns a schedule diff into per-user deliveries, gated by the
//! sent-notification ledger.

use std::sync::Arc;

use lectio_core::diff::{ScheduleDiff, compare};
use lectio_core::error::Result;
use lectio_core::normalize::{event_key, is_session_event};
use lectio_core::traits::{Delivery, MessageSink};
use lectio_core::types::{ChangeKind, Event, NoticePayload};
use lectio_store::Store;

use crate::format::change_notification;

/// Dispatches change notifications to a group's subscribers.
pub struct Notifier {
    store: Arc<Store>,
    sink: Arc<dyn MessageSink>,
}

impl Notifier {
    pub fn new(store: Arc<Store>, sink: Arc<dyn MessageSink>) -> Self {
        Self { store, sink }
    }

    /// Diff two event collections and deliver one message per change per
    /// enabled subscriber. Returns the number of confirmed deliveries.
    ///
    /// Delivery is at-most-once per (user, notification): a fingerprint is
    /// recorded only after the sink confirms. A transient failure leaves the
    /// ledger untouched so the same notice is eligible again next cycle; a
    /// blocked user (`Forbidden`) is skipped silently.
    pub async fn notify_schedule_changes(
        &self,
        group_id: i64,
        old: &[Event],
        new: &[Event],
    ) -> Result<usize> {
        let diff = compare(old, new);
        if diff.is_empty() {
            return Ok(0);
        }

        let subscribers = self.store.subscribers(group_id, true)?;
        if subscribers.is_empty() {
            tracing::debug!("Group {group_id}: changes but no enabled subscribers");
            return Ok(0);
        }
        let group_name = subscribers[0].group_name.clone();

        let notices = build_notices(&diff, &group_name);
        if notices.is_empty() {
            return Ok(0);
        }
        tracing::info!(
            "Group {group_id}: {} change(s), {} subscriber(s)",
            notices.len(),
            subscribers.len()
        );

        let mut sent = 0usize;
        for subscriber in &subscribers {
            for (text, payload) in &notices {
                if self.store.is_notification_sent(subscriber.user_id, payload)? {
                    continue;
                }
                match self.sink.deliver(subscriber.user_id, text).await {
                    Delivery::Sent => {
                        self.store
                            .mark_notification_sent(subscriber.user_id, payload)?;
                        sent += 1;
                    }
                    Delivery::Forbidden => {}
                    Delivery::Failed => {
                        tracing::warn!(
                            "Delivery to {} failed, will retry next cycle",
                            subscriber.user_id
                        );
                    }
                }
            }
        }
        Ok(sent)
    }
}

/// Message text plus its dedup payload for every notifiable change.
///
/// Session-window lessons (exams, credits) are excluded here: the regular
/// window occasionally overlaps the exam period, and those entries churn
/// too much to be worth a ping.
fn build_notices(diff: &ScheduleDiff, group_name: &str) -> Vec<(String, NoticePayload)> {
    let mut notices = Vec::with_capacity(diff.len());

    for event in &diff.added {
        if is_session_event(event) {
            continue;
        }
        notices.push((
            change_notification(ChangeKind::Added, event, &[], group_name),
            NoticePayload::new(ChangeKind::Added, event_key(event)),
        ));
    }
    for event in &diff.removed {
        if is_session_event(event) {
            continue;
        }
        notices.push((
            change_notification(ChangeKind::Removed, event, &[], group_name),
            NoticePayload::new(ChangeKind::Removed, event_key(event)),
        ));
    }
    for change in &diff.changed {
        if is_session_event(&change.new) {
            continue;
        }
        notices.push((
            change_notification(ChangeKind::Changed, &change.new, &change.changes, group_name),
            NoticePayload::new(ChangeKind::Changed, event_key(&change.new))
                .with_changes(change.changes.clone()),
        ));
    }
    notices
}
