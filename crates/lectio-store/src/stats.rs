//! Aggregate counters for the admin status surface.

use lectio_core::error::Result;

use crate::Store;

/// Point-in-time storage statistics plus recorded health state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total_users: i64,
    pub users_with_groups: i64,
    pub notifications_enabled: i64,
    pub unique_groups: i64,
    pub last_schedule_check: Option<String>,
    pub last_session_check: Option<String>,
    pub last_error: Option<String>,
}

impl Store {
    pub fn stats(&self) -> Result<StoreStats> {
        let (total_users, users_with_groups, notifications_enabled, unique_groups) = {
            let conn = self.conn()?;
            let count = |sql: &str| -> Result<i64> {
                conn.query_row(sql, [], |row| row.get(0))
                    .map_err(crate::store_err)
            };
            (
                count("SELECT COUNT(*) FROM users")?,
                count("SELECT COUNT(*) FROM users WHERE group_id IS NOT NULL")?,
                count("SELECT COUNT(*) FROM users WHERE notifications_enabled = 1")?,
                count("SELECT COUNT(DISTINCT group_id) FROM users WHERE group_id IS NOT NULL")?,
            )
        };
        Ok(StoreStats {
            total_users,
            users_with_groups,
            notifications_enabled,
            unique_groups,
            last_schedule_check: self.get_state("last_schedule_check")?,
            last_session_check: self.get_state("last_session_check")?,
            last_error: self.get_state("last_error")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counts() {
        let store = Store::open_in_memory().unwrap();
        store.set_user_group(1, 100, "G1").unwrap();
        store.set_user_group(2, 100, "G1").unwrap();
        store.set_user_group(3, 200, "G2").unwrap();
        store.toggle_notifications(3).unwrap();
        store.set_state("last_schedule_check", "2026-09-01 10:00:00").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.users_with_groups, 3);
        assert_eq!(stats.notifications_enabled, 2);
        assert_eq!(stats.unique_groups, 2);
        assert_eq!(
            stats.last_schedule_check.as_deref(),
            Some("2026-09-01 10:00:00")
        );
        assert!(stats.last_error.is_none());
    }
}
