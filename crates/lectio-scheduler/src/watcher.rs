//! The poll watcher: periodic change detection across all subscribed groups,
//! plus a throttled session-window probe and health bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDateTime, Utc};

use lectio_core::config::WatcherConfig;
use lectio_core::error::Result;
use lectio_core::traits::{MessageSink, ScheduleSource};
use lectio_core::types::SnapshotKind;
use lectio_store::Store;

use crate::notifier::Notifier;

const STATE_SCHEDULE_CHECK: &str = "last_schedule_check";
const STATE_SESSION_CHECK: &str = "last_session_check";
const STATE_LAST_ERROR: &str = "last_error";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ledger rows older than this are dropped on each session probe.
const PRUNE_AFTER_DAYS: i64 = 30;

/// Summary of one completed check cycle.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub started_at: String,
    pub duration: Duration,
}

/// Drives the whole pipeline: fetch, hash gate, diff, notify, snapshot.
pub struct ScheduleWatcher {
    source: Arc<dyn ScheduleSource>,
    store: Arc<Store>,
    notifier: Notifier,
    session_check_hours: i64,
    utc_offset_hours: i64,
}

impl ScheduleWatcher {
    pub fn new(
        source: Arc<dyn ScheduleSource>,
        store: Arc<Store>,
        sink: Arc<dyn MessageSink>,
        config: &WatcherConfig,
    ) -> Self {
        let notifier = Notifier::new(Arc::clone(&store), sink);
        Self {
            source,
            store,
            notifier,
            session_check_hours: config.session_check_hours,
            utc_offset_hours: config.utc_offset_hours,
        }
    }

    fn now_string(&self) -> String {
        let offset = FixedOffset::east_opt(self.utc_offset_hours as i32 * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Utc::now()
            .with_timezone(&offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// One full check cycle. Never propagates an error: failures land in
    /// `last_error` and the log so the loop keeps its cadence.
    pub async fn run_check(&self) {
        if let Err(e) = self.check_all_groups().await {
            tracing::error!("Check cycle failed: {e}");
            let note = format!("{}: {e}", self.now_string());
            if let Err(e) = self.store.set_state(STATE_LAST_ERROR, &note) {
                tracing::error!("Failed to record last_error: {e}");
            }
        }
    }

    /// Manual trigger for the admin surface; same cycle, with a report.
    pub async fn trigger_manual_check(&self) -> CheckReport {
        let started_at = self.now_string();
        let started = std::time::Instant::now();
        self.run_check().await;
        CheckReport {
            started_at,
            duration: started.elapsed(),
        }
    }

    async fn check_all_groups(&self) -> Result<()> {
        let group_ids = self.store.subscribed_group_ids()?;
        if group_ids.is_empty() {
            tracing::debug!("No subscribed groups, skipping cycle");
            return Ok(());
        }

        let mut total_sent = 0usize;
        let mut errors = Vec::new();
        for &group_id in &group_ids {
            match self.check_group(group_id).await {
                Ok(sent) => total_sent += sent,
                Err(e) => {
                    tracing::warn!("Group {group_id} check failed: {e}");
                    errors.push(format!("group {group_id}: {e}"));
                }
            }
        }

        let now = self.now_string();
        self.store.set_state(STATE_SCHEDULE_CHECK, &now)?;
        if !errors.is_empty() {
            let summary = errors.iter().take(3).cloned().collect::<Vec<_>>().join("; ");
            self.store
                .set_state(STATE_LAST_ERROR, &format!("{now}: {summary}"))?;
        }
        if total_sent > 0 {
            tracing::info!(
                "Cycle done: {} group(s), {total_sent} notification(s)",
                group_ids.len()
            );
        }

        self.maybe_check_session(&group_ids).await;
        Ok(())
    }

    /// Fetch, gate on the content hash, diff, notify, snapshot. Returns the
    /// number of confirmed deliveries.
    async fn check_group(&self, group_id: i64) -> Result<usize> {
        let events = self.source.regular_events(group_id).await?;

        let Some((old_hash, old_events)) =
            self.store.get_snapshot(group_id, SnapshotKind::Regular)?
        else {
            // Cold start: establish the baseline without notifying.
            self.store
                .save_snapshot(group_id, &events, SnapshotKind::Regular)?;
            tracing::info!("Group {group_id}: baseline snapshot stored");
            return Ok(0);
        };

        let new_hash = Store::hash_events(&events)?;
        if new_hash == old_hash {
            return Ok(0);
        }

        let sent = self
            .notifier
            .notify_schedule_changes(group_id, &old_events, &events)
            .await?;
        // Snapshot advances even when nothing was delivered; dedup owns
        // per-user retry, not the snapshot.
        self.store
            .save_snapshot(group_id, &events, SnapshotKind::Regular)?;
        Ok(sent)
    }

    /// Session-window probe, throttled to one fetch per cooldown period.
    /// Keeps `last_session_check` fresh for the health surface and uses the
    /// visit to prune the dedup ledger.
    async fn maybe_check_session(&self, group_ids: &[i64]) {
        if !self.session_check_due() {
            return;
        }
        let Some(&group_id) = group_ids.first() else {
            return;
        };
        match self.source.session_events(group_id).await {
            Ok(events) => {
                tracing::info!(
                    "Session probe ok: {} session event(s) for group {group_id}",
                    events.len()
                );
                if let Err(e) = self.store.set_state(STATE_SESSION_CHECK, &self.now_string()) {
                    tracing::error!("Failed to record session check: {e}");
                }
                if let Err(e) = self.store.prune_sent_notifications(PRUNE_AFTER_DAYS) {
                    tracing::warn!("Ledger prune failed: {e}");
                }
            }
            Err(e) => {
                tracing::warn!("Session probe failed for group {group_id}: {e}");
            }
        }
    }

    fn session_check_due(&self) -> bool {
        let last = match self.store.get_state(STATE_SESSION_CHECK) {
            Ok(Some(value)) => value,
            Ok(None) => return true,
            Err(e) => {
                tracing::warn!("Failed to read session check state: {e}");
                return true;
            }
        };
        match NaiveDateTime::parse_from_str(&last, TIMESTAMP_FORMAT) {
            Ok(parsed) => {
                let offset = FixedOffset::east_opt(self.utc_offset_hours as i32 * 3600)
                    .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
                let now = Utc::now().with_timezone(&offset).naive_local();
                now - parsed >= chrono::Duration::hours(self.session_check_hours)
            }
            // Malformed state must not wedge the probe forever.
            Err(_) => true,
        }
    }
}

/// Run the watcher on a fixed interval until the task is dropped.
/// The first tick fires immediately.
pub async fn spawn_watcher(watcher: Arc<ScheduleWatcher>, interval_minutes: u64) {
    // Config validation rejects 0, but a zero period would panic the task;
    // clamp so a bad caller degrades to a 1-minute cadence instead.
    let interval_minutes = interval_minutes.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
    tracing::info!("Schedule watcher started, every {interval_minutes} min");
    loop {
        interval.tick().await;
        watcher.run_check().await;
    }
}
