//! SQLite storage backend: users, schedule snapshots, the sent-notification
//! dedup ledger, and free-form system state.
//!
//! Snapshot writes are idempotent upserts keyed by (group, kind); the dedup
//! ledger is append-only with age-based pruning as pure hygiene.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use lectio_core::error::{LectioError, Result};
use lectio_core::types::{Event, NoticePayload, SnapshotKind, Subscription};

mod stats;

pub use stats::StoreStats;

/// Storage handle. Cheap to share behind an `Arc`; the connection is
/// serialized through a mutex like the rest of our SQLite usage.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            -- Subscribed users
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                group_id INTEGER,
                group_name TEXT,
                notifications_enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            -- Last observed event collection per (group, kind)
            CREATE TABLE IF NOT EXISTS schedule_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL,
                schedule_hash TEXT NOT NULL,
                schedule_data TEXT NOT NULL,
                snapshot_kind TEXT NOT NULL DEFAULT 'regular',
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(group_id, snapshot_kind)
            );

            -- Delivered notifications (dedup ledger)
            CREATE TABLE IF NOT EXISTS sent_notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, fingerprint)
            );

            -- Health bookkeeping
            CREATE TABLE IF NOT EXISTS system_state (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_users_group ON users(group_id);
            CREATE INDEX IF NOT EXISTS idx_snapshots_group ON schedule_snapshots(group_id);
            CREATE INDEX IF NOT EXISTS idx_sent_user_fp
                ON sent_notifications(user_id, fingerprint);
         ",
            )
            .map_err(store_err)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LectioError::Store(format!("connection poisoned: {e}")))
    }

    // ─── Users ──────────────────────────────────────

    pub fn get_user(&self, user_id: i64) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, group_id, group_name, notifications_enabled
                 FROM users WHERE user_id = ?1",
            )
            .map_err(store_err)?;
        let user = stmt
            .query_row([user_id], row_to_subscription)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })?;
        Ok(user)
    }

    /// Set (or change) a user's group, creating the user when absent.
    /// New users start with notifications enabled.
    pub fn set_user_group(&self, user_id: i64, group_id: i64, group_name: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO users (user_id, group_id, group_name)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     group_id = excluded.group_id,
                     group_name = excluded.group_name,
                     updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![user_id, group_id, group_name],
            )
            .map_err(store_err)?;
        Ok(())
    }

    /// Flip the notifications flag; returns the new state.
    pub fn toggle_notifications(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET
                 notifications_enabled = 1 - notifications_enabled,
                 updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?1",
            [user_id],
        )
        .map_err(store_err)?;
        let enabled: i64 = conn
            .query_row(
                "SELECT notifications_enabled FROM users WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(enabled != 0)
    }

    /// Users subscribed to a group, optionally only those with
    /// notifications enabled.
    pub fn subscribers(&self, group_id: i64, enabled_only: bool) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let sql = if enabled_only {
            "SELECT user_id, group_id, group_name, notifications_enabled
             FROM users WHERE group_id = ?1 AND notifications_enabled = 1"
        } else {
            "SELECT user_id, group_id, group_name, notifications_enabled
             FROM users WHERE group_id = ?1"
        };
        let mut stmt = conn.prepare(sql).map_err(store_err)?;
        let rows = stmt
            .query_map([group_id], row_to_subscription)
            .map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    /// Distinct group ids with at least one subscriber.
    pub fn subscribed_group_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT group_id FROM users WHERE group_id IS NOT NULL")
            .map_err(store_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    // ─── Schedule snapshots ──────────────────────────────────────

    /// Content hash over the serialized event collection.
    ///
    /// The input is hashed as fetched (order-sensitive): a reorder-only
    /// upstream change flips the hash and triggers a diff that finds
    /// nothing, which is harmless and cheaper than masking it.
    pub fn hash_events(events: &[Event]) -> Result<String> {
        let serialized = serde_json::to_vec(events)?;
        Ok(format!("{:x}", Sha256::digest(&serialized)))
    }

    /// Last stored (hash, events) for a group, or `None` on cold start.
    pub fn get_snapshot(
        &self,
        group_id: i64,
        kind: SnapshotKind,
    ) -> Result<Option<(String, Vec<Event>)>> {
        let conn = self.conn()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT schedule_hash, schedule_data FROM schedule_snapshots
                 WHERE group_id = ?1 AND snapshot_kind = ?2",
                rusqlite::params![group_id, kind.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })?;
        match row {
            Some((hash, data)) => {
                let events: Vec<Event> = serde_json::from_str(&data)?;
                Ok(Some((hash, events)))
            }
            None => Ok(None),
        }
    }

    /// Upsert the snapshot for (group, kind); returns the new content hash.
    pub fn save_snapshot(
        &self,
        group_id: i64,
        events: &[Event],
        kind: SnapshotKind,
    ) -> Result<String> {
        let hash = Self::hash_events(events)?;
        let serialized = serde_json::to_string(events)?;
        // Millisecond timestamps so a rewrite is observable even between
        // back-to-back check cycles.
        self.conn()?
            .execute(
                "INSERT INTO schedule_snapshots
                     (group_id, schedule_hash, schedule_data, snapshot_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, strftime('%Y-%m-%d %H:%M:%f', 'now'))
                 ON CONFLICT(group_id, snapshot_kind) DO UPDATE SET
                     schedule_hash = excluded.schedule_hash,
                     schedule_data = excluded.schedule_data,
                     created_at = strftime('%Y-%m-%d %H:%M:%f', 'now')",
                rusqlite::params![group_id, hash, serialized, kind.as_str()],
            )
            .map_err(store_err)?;
        Ok(hash)
    }

    /// When the snapshot for (group, kind) was last written.
    pub fn snapshot_created_at(
        &self,
        group_id: i64,
        kind: SnapshotKind,
    ) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT created_at FROM schedule_snapshots
             WHERE group_id = ?1 AND snapshot_kind = ?2",
            rusqlite::params![group_id, kind.as_str()],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(store_err(other)),
        })
    }

    // ─── Sent-notification dedup ──────────────────────────────────────

    /// Deterministic digest identifying one (user, notification) pair.
    pub fn fingerprint(user_id: i64, payload: &NoticePayload) -> String {
        #[derive(serde::Serialize)]
        struct FingerprintInput<'a> {
            user_id: i64,
            #[serde(flatten)]
            payload: &'a NoticePayload,
        }
        let input = FingerprintInput { user_id, payload };
        // Struct field order fixes the serialization, so the digest is stable.
        let serialized = serde_json::to_vec(&input).unwrap_or_default();
        format!("{:x}", Sha256::digest(&serialized))
    }

    pub fn is_notification_sent(&self, user_id: i64, payload: &NoticePayload) -> Result<bool> {
        let fp = Self::fingerprint(user_id, payload);
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM sent_notifications WHERE user_id = ?1 AND fingerprint = ?2",
                rusqlite::params![user_id, fp],
                |_| Ok(()),
            )
            .map(|_| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(store_err(other)),
            })?;
        Ok(found)
    }

    /// Record a confirmed delivery. Only called after the sink reported
    /// success; a failed delivery must stay unrecorded so the next cycle can
    /// pick it up again.
    pub fn mark_notification_sent(&self, user_id: i64, payload: &NoticePayload) -> Result<()> {
        let fp = Self::fingerprint(user_id, payload);
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO sent_notifications (user_id, fingerprint)
                 VALUES (?1, ?2)",
                rusqlite::params![user_id, fp],
            )
            .map_err(store_err)?;
        Ok(())
    }

    /// Drop ledger rows older than `days`. Storage hygiene only; dedup
    /// correctness does not depend on pruning.
    pub fn prune_sent_notifications(&self, days: i64) -> Result<usize> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM sent_notifications
                 WHERE created_at < datetime('now', ?1)",
                [format!("-{days} days")],
            )
            .map_err(store_err)?;
        if removed > 0 {
            tracing::info!("Pruned {removed} sent-notification records");
        }
        Ok(removed)
    }

    // ─── System state ──────────────────────────────────────

    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM system_state WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(store_err(other)),
        })
    }

    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO system_state (key, value, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![key, value],
            )
            .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: rusqlite::Error) -> LectioError {
    LectioError::Store(e.to_string())
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        user_id: row.get(0)?,
        group_id: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        group_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        notifications_enabled: row.get::<_, i64>(3)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectio_core::types::{ChangeField, ChangeKind};

    fn lesson(subject: &str) -> Event {
        Event::new("2026-09-01", "10:00", "11:30", subject, "lecture")
            .with_educator("Ivanov I. I.")
            .with_location("Room 305")
    }

    #[test]
    fn test_snapshot_cold_start_and_upsert() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_snapshot(7, SnapshotKind::Regular).unwrap().is_none());

        let events = vec![lesson("Math")];
        let hash = store.save_snapshot(7, &events, SnapshotKind::Regular).unwrap();
        let (stored_hash, stored_events) =
            store.get_snapshot(7, SnapshotKind::Regular).unwrap().unwrap();
        assert_eq!(hash, stored_hash);
        assert_eq!(stored_events, events);

        // Upsert overwrites, no second row per (group, kind).
        let newer = vec![lesson("History")];
        let new_hash = store.save_snapshot(7, &newer, SnapshotKind::Regular).unwrap();
        assert_ne!(hash, new_hash);
        let (h, e) = store.get_snapshot(7, SnapshotKind::Regular).unwrap().unwrap();
        assert_eq!(h, new_hash);
        assert_eq!(e, newer);
    }

    #[test]
    fn test_snapshot_rewrite_bumps_created_at() {
        let store = Store::open_in_memory().unwrap();
        assert!(
            store
                .snapshot_created_at(7, SnapshotKind::Regular)
                .unwrap()
                .is_none()
        );

        let events = vec![lesson("Math")];
        store.save_snapshot(7, &events, SnapshotKind::Regular).unwrap();
        let first = store.snapshot_created_at(7, SnapshotKind::Regular).unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save_snapshot(7, &events, SnapshotKind::Regular).unwrap();
        let second = store.snapshot_created_at(7, SnapshotKind::Regular).unwrap().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_snapshot_kinds_are_independent() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_snapshot(7, &[lesson("Math")], SnapshotKind::Regular)
            .unwrap();
        assert!(store.get_snapshot(7, SnapshotKind::Session).unwrap().is_none());
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let a = vec![lesson("Math"), lesson("History")];
        let b = vec![lesson("History"), lesson("Math")];
        assert_ne!(
            Store::hash_events(&a).unwrap(),
            Store::hash_events(&b).unwrap()
        );
        assert_eq!(
            Store::hash_events(&a).unwrap(),
            Store::hash_events(&a).unwrap()
        );
    }

    #[test]
    fn test_subscribers_and_group_ids() {
        let store = Store::open_in_memory().unwrap();
        store.set_user_group(1, 100, "ГРУППА-1").unwrap();
        store.set_user_group(2, 100, "ГРУППА-1").unwrap();
        store.set_user_group(3, 200, "ГРУППА-2").unwrap();
        store.toggle_notifications(2).unwrap();

        let enabled = store.subscribers(100, true).unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].user_id, 1);
        assert_eq!(enabled[0].group_name, "ГРУППА-1");

        let all = store.subscribers(100, false).unwrap();
        assert_eq!(all.len(), 2);

        let mut groups = store.subscribed_group_ids().unwrap();
        groups.sort();
        assert_eq!(groups, vec![100, 200]);
    }

    #[test]
    fn test_toggle_notifications_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store.set_user_group(1, 100, "G").unwrap();
        assert!(!store.toggle_notifications(1).unwrap());
        assert!(store.toggle_notifications(1).unwrap());
    }

    #[test]
    fn test_notification_dedup() {
        let store = Store::open_in_memory().unwrap();
        let payload = NoticePayload::new(ChangeKind::Changed, "key-1".into())
            .with_changes(vec![ChangeField::Time]);

        assert!(!store.is_notification_sent(1, &payload).unwrap());
        store.mark_notification_sent(1, &payload).unwrap();
        assert!(store.is_notification_sent(1, &payload).unwrap());

        // Same content, different user: independent.
        assert!(!store.is_notification_sent(2, &payload).unwrap());

        // Different change list means a different fingerprint.
        let other = NoticePayload::new(ChangeKind::Changed, "key-1".into())
            .with_changes(vec![ChangeField::Location]);
        assert!(!store.is_notification_sent(1, &other).unwrap());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let payload = NoticePayload::new(ChangeKind::Added, "key-2".into());
        assert_eq!(
            Store::fingerprint(5, &payload),
            Store::fingerprint(5, &payload)
        );
        assert_ne!(
            Store::fingerprint(5, &payload),
            Store::fingerprint(6, &payload)
        );
    }

    #[test]
    fn test_prune_keeps_recent_rows() {
        let store = Store::open_in_memory().unwrap();
        let payload = NoticePayload::new(ChangeKind::Added, "key-3".into());
        store.mark_notification_sent(1, &payload).unwrap();
        // Fresh rows survive a 30-day prune.
        assert_eq!(store.prune_sent_notifications(30).unwrap(), 0);
        assert!(store.is_notification_sent(1, &payload).unwrap());
    }

    #[test]
    fn test_system_state_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_state("last_error").unwrap().is_none());
        store.set_state("last_error", "2026-09-01 10:00:00: boom").unwrap();
        assert_eq!(
            store.get_state("last_error").unwrap().as_deref(),
            Some("2026-09-01 10:00:00: boom")
        );
        store.set_state("last_error", "newer").unwrap();
        assert_eq!(store.get_state("last_error").unwrap().as_deref(), Some("newer"));
    }
}
