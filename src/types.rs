//! Core types for the task manager.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Format used when a timestamp is rendered for humans (exports, reminders).
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Render a timestamp as `YYYY-MM-DDTHH:MM:SS`.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Task priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Parse a priority name ("low", "medium", "high"), case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    /// Base weight used by the heuristic scorer.
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Low => 0.2,
            Priority::Medium => 0.5,
            Priority::High => 0.8,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by tasks and subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "todo" => Some(TaskStatus::Pending),
            "in_progress" | "in-progress" => Some(TaskStatus::InProgress),
            "completed" | "done" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

/// A task owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDateTime>,
    pub estimated_hours: Option<f64>,
    pub priority_score: f64,
    pub reminder_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl Task {
    /// Apply a partial update in place. Fields absent from the patch are kept.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(estimated_hours) = patch.estimated_hours {
            self.estimated_hours = estimated_hours;
        }
        if let Some(reminder_date) = patch.reminder_date {
            self.reminder_date = reminder_date;
        }
    }

    /// Due in the past and not yet completed.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < now)
    }
}

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDateTime>,
    pub estimated_hours: Option<f64>,
    pub reminder_date: Option<NaiveDateTime>,
}

/// Partial task update. The outer `Option` marks presence; the inner one
/// distinguishes clearing a nullable field from setting it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDateTime>>,
    pub estimated_hours: Option<Option<f64>>,
    pub reminder_date: Option<Option<NaiveDateTime>>,
}

/// Filters for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,
}

/// A checklist item under a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subtask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    pub status: TaskStatus,
}

/// A progress note recorded against a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressLog {
    pub id: i64,
    pub task_id: i64,
    pub note: Option<String>,
    pub progress: f64,
    pub created_at: NaiveDateTime,
}

/// Task with its subtasks, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub overdue: bool,
    pub subtasks: Vec<Subtask>,
}

/// Per-user task statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub overdue: i64,
    pub by_priority: BTreeMap<String, i64>,
    pub by_category: BTreeMap<String, i64>,
}

/// A task whose reminder is due, with the owner's address if one exists.
#[derive(Debug, Clone)]
pub struct DueReminder {
    pub task: Task,
    pub email: Option<String>,
}

/// Deserialize a field that may be absent, null, or set.
///
/// Use together with `#[serde(default)]` so that an absent field stays `None`
/// while an explicit `null` becomes `Some(None)`.
pub fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sample_task() -> Task {
        Task {
            id: 1,
            user_id: 1,
            title: "Write report".to_string(),
            description: Some("quarterly".to_string()),
            category: Some("work".to_string()),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            due_date: Some(at(2025, 3, 14, 17)),
            estimated_hours: Some(2.0),
            priority_score: 40.0,
            reminder_date: Some(at(2025, 3, 14, 15)),
            created_at: at(2025, 3, 1, 9),
        }
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
        assert_eq!(Priority::parse(" low "), Some(Priority::Low));
        assert_eq!(Priority::parse("critical"), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(TaskStatus::parse("in_progress"), Some(TaskStatus::InProgress));
    }

    #[test]
    fn test_apply_patch_keeps_absent_fields() {
        let mut task = sample_task();
        task.apply(TaskPatch {
            status: Some(TaskStatus::Completed),
            description: Some(None),
            ..Default::default()
        });

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.description, None);
        assert_eq!(task.title, "Write report");
        assert_eq!(task.category.as_deref(), Some("work"));
    }

    #[test]
    fn test_overdue() {
        let mut task = sample_task();
        assert!(task.is_overdue(at(2025, 3, 15, 0)));
        assert!(!task.is_overdue(at(2025, 3, 13, 0)));

        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(at(2025, 3, 15, 0)));
    }

    #[test]
    fn test_double_option() {
        #[derive(Deserialize)]
        struct Body {
            #[serde(default, deserialize_with = "double_option")]
            note: Option<Option<String>>,
        }

        let absent: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.note, None);
        let null: Body = serde_json::from_str(r#"{"note": null}"#).unwrap();
        assert_eq!(null.note, Some(None));
        let set: Body = serde_json::from_str(r#"{"note": "x"}"#).unwrap();
        assert_eq!(set.note, Some(Some("x".to_string())));
    }
}
