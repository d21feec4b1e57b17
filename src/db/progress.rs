//! Progress notes.

use super::Database;
use crate::types::ProgressLog;
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{Row, params};

fn parse_progress_row(row: &Row) -> rusqlite::Result<ProgressLog> {
    Ok(ProgressLog {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        note: row.get("note")?,
        progress: row.get("progress")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Record progress against a user's task. `progress` is clamped to
    /// [0, 100]. Returns `None` if the task is not the user's.
    pub fn add_progress(
        &self,
        user_id: i64,
        task_id: i64,
        note: Option<&str>,
        progress: f64,
        now: NaiveDateTime,
    ) -> Result<Option<ProgressLog>> {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 100.0)
        } else {
            0.0
        };

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO progress_logs (task_id, note, progress, created_at)
                 SELECT id, ?3, ?4, ?5 FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id, note, progress, now],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            Ok(Some(ProgressLog {
                id: conn.last_insert_rowid(),
                task_id,
                note: note.map(str::to_string),
                progress,
                created_at: now,
            }))
        })
    }

    /// Progress history for a task, oldest first.
    pub fn list_progress(&self, user_id: i64, task_id: i64) -> Result<Vec<ProgressLog>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.* FROM progress_logs p
                 JOIN tasks t ON t.id = p.task_id
                 WHERE p.task_id = ?1 AND t.user_id = ?2
                 ORDER BY p.created_at, p.id",
            )?;
            let logs = stmt
                .query_map(params![task_id, user_id], parse_progress_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(logs)
        })
    }
}
