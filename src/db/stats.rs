//! Aggregation queries for statistics.

use super::Database;
use crate::types::{Priority, Stats, TaskStatus};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::params;

impl Database {
    /// Counts by status, priority and category for one user.
    pub fn get_stats(&self, user_id: i64, now: NaiveDateTime) -> Result<Stats> {
        self.with_conn(|conn| {
            let mut stats = Stats::default();
            for priority in Priority::ALL {
                stats.by_priority.insert(priority.as_str().to_string(), 0);
            }

            let mut stmt = conn.prepare(
                "SELECT status, priority, COUNT(*) FROM tasks
                 WHERE user_id = ?1 GROUP BY status, priority",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, TaskStatus>(0)?,
                    row.get::<_, Priority>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;
            for row in rows {
                let (status, priority, count) = row?;
                stats.total += count;
                match status {
                    TaskStatus::Pending => stats.pending += count,
                    TaskStatus::InProgress => stats.in_progress += count,
                    TaskStatus::Completed => stats.completed += count,
                }
                *stats
                    .by_priority
                    .entry(priority.as_str().to_string())
                    .or_default() += count;
            }

            let mut stmt = conn.prepare(
                "SELECT COALESCE(NULLIF(category, ''), 'uncategorized'), COUNT(*) FROM tasks
                 WHERE user_id = ?1 GROUP BY 1",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (category, count) = row?;
                *stats.by_category.entry(category.to_lowercase()).or_default() += count;
            }

            stats.overdue = conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE user_id = ?1 AND status != 'completed'
                   AND due_date IS NOT NULL AND due_date < ?2",
                params![user_id, now],
                |row| row.get(0),
            )?;

            Ok(stats)
        })
    }
}
