//! Task CRUD and listing.

use super::Database;
use crate::types::{NewTask, Subtask, Task, TaskFilter, TaskStatus};
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: row.get("category")?,
        status: row.get("status")?,
        priority: row.get("priority")?,
        due_date: row.get("due_date")?,
        estimated_hours: row.get("estimated_hours")?,
        priority_score: row.get("priority_score")?,
        reminder_date: row.get("reminder_date")?,
        created_at: row.get("created_at")?,
    })
}

fn insert_task(
    conn: &Connection,
    user_id: i64,
    new: &NewTask,
    priority_score: f64,
    now: NaiveDateTime,
) -> rusqlite::Result<Task> {
    conn.execute(
        "INSERT INTO tasks (user_id, title, description, category, status, priority,
                            due_date, estimated_hours, priority_score, reminder_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user_id,
            new.title,
            new.description,
            new.category,
            new.status,
            new.priority,
            new.due_date,
            new.estimated_hours,
            priority_score,
            new.reminder_date,
            now,
        ],
    )?;

    Ok(Task {
        id: conn.last_insert_rowid(),
        user_id,
        title: new.title.clone(),
        description: new.description.clone(),
        category: new.category.clone(),
        status: new.status,
        priority: new.priority,
        due_date: new.due_date,
        estimated_hours: new.estimated_hours,
        priority_score,
        reminder_date: new.reminder_date,
        created_at: now,
    })
}

/// Case-insensitive substring match on title or description.
fn mentions(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

impl Database {
    /// Insert a task for `user_id` and return it.
    pub fn create_task(
        &self,
        user_id: i64,
        new: &NewTask,
        priority_score: f64,
        now: NaiveDateTime,
    ) -> Result<Task> {
        self.with_conn(|conn| Ok(insert_task(conn, user_id, new, priority_score, now)?))
    }

    /// Insert a task together with its subtasks. Nothing is stored if any
    /// insert fails.
    pub fn create_task_with_subtasks(
        &self,
        user_id: i64,
        new: &NewTask,
        subtasks: &[String],
        priority_score: f64,
        now: NaiveDateTime,
    ) -> Result<(Task, Vec<Subtask>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = insert_task(&tx, user_id, new, priority_score, now)?;
            let mut created = Vec::with_capacity(subtasks.len());
            for title in subtasks {
                tx.execute(
                    "INSERT INTO subtasks (task_id, title, status) VALUES (?1, ?2, ?3)",
                    params![task.id, title, TaskStatus::Pending],
                )?;
                created.push(Subtask {
                    id: tx.last_insert_rowid(),
                    task_id: task.id,
                    title: title.clone(),
                    status: TaskStatus::Pending,
                });
            }
            tx.commit()?;
            Ok((task, created))
        })
    }

    /// Get a task owned by `user_id`.
    pub fn get_task(&self, user_id: i64, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let task = conn
                .query_row(
                    "SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2",
                    params![task_id, user_id],
                    parse_task_row,
                )
                .optional()?;
            Ok(task)
        })
    }

    /// List a user's tasks, highest score first, then soonest due with
    /// undated tasks ahead of dated ones.
    pub fn list_tasks(&self, user_id: i64, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT * FROM tasks WHERE user_id = ?");
            let mut values: Vec<Value> = vec![Value::Integer(user_id)];

            if let Some(status) = filter.status {
                sql.push_str(" AND status = ?");
                values.push(Value::Text(status.as_str().to_string()));
            }
            if let Some(priority) = filter.priority {
                sql.push_str(" AND priority = ?");
                values.push(Value::Text(priority.as_str().to_string()));
            }
            if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
                sql.push_str(" AND category = ? COLLATE NOCASE");
                values.push(Value::Text(category.to_string()));
            }

            sql.push_str(" ORDER BY priority_score DESC, due_date IS NOT NULL, due_date ASC, id ASC");

            let mut stmt = conn.prepare(&sql)?;
            let mut tasks = stmt
                .query_map(params_from_iter(values.iter()), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            // SQLite only folds ASCII case, so text search runs here.
            if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                let needle = term.to_lowercase();
                tasks.retain(|task| mentions(task, &needle));
            }
            Ok(tasks)
        })
    }

    /// Every task a user owns, in creation order.
    pub fn all_tasks(&self, user_id: i64) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE user_id = ?1 ORDER BY id")?;
            let tasks = stmt
                .query_map(params![user_id], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Persist the editable fields of a task, leaving `reminder_date` as
    /// stored so a concurrent delivery is never undone. Returns false if the
    /// task does not exist for its owner.
    pub fn save_task(&self, task: &Task) -> Result<bool> {
        self.update_task_row(task, false)
    }

    /// Like [`save_task`](Self::save_task), but also writes `reminder_date`.
    pub fn save_task_with_reminder(&self, task: &Task) -> Result<bool> {
        self.update_task_row(task, true)
    }

    fn update_task_row(&self, task: &Task, write_reminder: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, category = ?3, status = ?4,
                                  priority = ?5, due_date = ?6, estimated_hours = ?7,
                                  priority_score = ?8,
                                  reminder_date = CASE WHEN ?9 THEN ?10 ELSE reminder_date END
                 WHERE id = ?11 AND user_id = ?12",
                params![
                    task.title,
                    task.description,
                    task.category,
                    task.status,
                    task.priority,
                    task.due_date,
                    task.estimated_hours,
                    task.priority_score,
                    write_reminder,
                    task.reminder_date,
                    task.id,
                    task.user_id,
                ],
            )?;
            Ok(updated > 0)
        })
    }

    /// Delete a task and, through cascades, its subtasks and progress logs.
    pub fn delete_task(&self, user_id: i64, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}
