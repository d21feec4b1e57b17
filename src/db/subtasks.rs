//! Subtask checklist items.
//!
//! Ownership is checked through the parent task, so a subtask id belonging to
//! another user behaves exactly like a missing one.

use super::Database;
use crate::types::{Subtask, TaskStatus};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use std::collections::HashMap;

fn parse_subtask_row(row: &Row) -> rusqlite::Result<Subtask> {
    Ok(Subtask {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        title: row.get("title")?,
        status: row.get("status")?,
    })
}

const OWNED_SUBTASK: &str = "SELECT s.* FROM subtasks s
     JOIN tasks t ON t.id = s.task_id
     WHERE s.id = ?1 AND t.user_id = ?2";

impl Database {
    /// Add a subtask. Returns `None` if the parent task is not the user's.
    pub fn add_subtask(
        &self,
        user_id: i64,
        task_id: i64,
        title: &str,
        status: TaskStatus,
    ) -> Result<Option<Subtask>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO subtasks (task_id, title, status)
                 SELECT id, ?3, ?4 FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id, title, status],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            Ok(Some(Subtask {
                id: conn.last_insert_rowid(),
                task_id,
                title: title.to_string(),
                status,
            }))
        })
    }

    /// Subtasks of one task, in creation order.
    pub fn list_subtasks(&self, user_id: i64, task_id: i64) -> Result<Vec<Subtask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.* FROM subtasks s
                 JOIN tasks t ON t.id = s.task_id
                 WHERE s.task_id = ?1 AND t.user_id = ?2
                 ORDER BY s.id",
            )?;
            let subtasks = stmt
                .query_map(params![task_id, user_id], parse_subtask_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(subtasks)
        })
    }

    /// All of a user's subtasks grouped by task id.
    pub fn subtasks_by_task(&self, user_id: i64) -> Result<HashMap<i64, Vec<Subtask>>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.* FROM subtasks s
                 JOIN tasks t ON t.id = s.task_id
                 WHERE t.user_id = ?1
                 ORDER BY s.id",
            )?;
            let mut grouped: HashMap<i64, Vec<Subtask>> = HashMap::new();
            for subtask in stmt.query_map(params![user_id], parse_subtask_row)? {
                let subtask = subtask?;
                grouped.entry(subtask.task_id).or_default().push(subtask);
            }
            Ok(grouped)
        })
    }

    /// Change a subtask's title and/or status. Returns the updated subtask,
    /// or `None` if it is not the user's.
    pub fn update_subtask(
        &self,
        user_id: i64,
        subtask_id: i64,
        title: Option<&str>,
        status: Option<TaskStatus>,
    ) -> Result<Option<Subtask>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut subtask) = tx
                .query_row(OWNED_SUBTASK, params![subtask_id, user_id], parse_subtask_row)
                .optional()?
            else {
                return Ok(None);
            };

            if let Some(title) = title {
                subtask.title = title.to_string();
            }
            if let Some(status) = status {
                subtask.status = status;
            }
            tx.execute(
                "UPDATE subtasks SET title = ?1, status = ?2 WHERE id = ?3",
                params![subtask.title, subtask.status, subtask.id],
            )?;
            tx.commit()?;
            Ok(Some(subtask))
        })
    }

    pub fn delete_subtask(&self, user_id: i64, subtask_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM subtasks WHERE id = ?1
                   AND task_id IN (SELECT id FROM tasks WHERE user_id = ?2)",
                params![subtask_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}
