//! Reminder lookups for the background worker.

use super::Database;
use super::tasks::parse_task_row;
use crate::types::DueReminder;
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::params;

impl Database {
    /// Tasks of any user whose reminder is at or before `now`, with the
    /// owner's email when the owner still exists.
    pub fn due_reminders(&self, now: NaiveDateTime) -> Result<Vec<DueReminder>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.*, u.email AS owner_email FROM tasks t
                 LEFT JOIN users u ON u.id = t.user_id
                 WHERE t.reminder_date IS NOT NULL AND t.reminder_date <= ?1
                 ORDER BY t.reminder_date, t.id",
            )?;
            let due = stmt
                .query_map(params![now], |row| {
                    let email: Option<String> = row.get("owner_email")?;
                    Ok(DueReminder {
                        task: parse_task_row(row)?,
                        email: email.filter(|e| !e.trim().is_empty()),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(due)
        })
    }

    /// Clear a task's reminder once the one set for `reminder_at` has been
    /// handled. A reminder rescheduled in the meantime is kept. Returns
    /// whether anything was cleared.
    pub fn clear_reminder(&self, task_id: i64, reminder_at: NaiveDateTime) -> Result<bool> {
        self.with_conn(|conn| {
            let cleared = conn.execute(
                "UPDATE tasks SET reminder_date = NULL
                 WHERE id = ?1 AND reminder_date = ?2",
                params![task_id, reminder_at],
            )?;
            Ok(cleared > 0)
        })
    }
}
