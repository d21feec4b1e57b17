//! Task report exports.
//!
//! Reports are flat rows with one line per task, rendered as CSV, JSON or a
//! Markdown table.

use crate::types::{Task, format_datetime};
use serde::Serialize;
use std::fmt::Write;

/// Output format for a task report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Markdown,
}

impl ExportFormat {
    /// Parse a format name. Spreadsheet names map to CSV and document names
    /// to Markdown.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" | "excel" | "xlsx" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "markdown" | "md" | "pdf" => Some(ExportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn file_name(&self) -> String {
        format!("tasks.{}", self.extension())
    }
}

/// One exported task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub title: String,
    pub category: String,
    pub status: String,
    pub priority: String,
    pub due_date: String,
    pub estimated_hours: Option<f64>,
    pub priority_score: f64,
    pub created_at: String,
}

const COLUMNS: [&str; 8] = [
    "title",
    "category",
    "status",
    "priority",
    "due_date",
    "estimated_hours",
    "priority_score",
    "created_at",
];

impl ExportRow {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            category: task.category.clone().unwrap_or_default(),
            status: task.status.to_string(),
            priority: task.priority.to_string(),
            due_date: task.due_date.as_ref().map(format_datetime).unwrap_or_default(),
            estimated_hours: task.estimated_hours,
            priority_score: task.priority_score,
            created_at: format_datetime(&task.created_at),
        }
    }

    fn cells(&self) -> [String; 8] {
        [
            self.title.clone(),
            self.category.clone(),
            self.status.clone(),
            self.priority.clone(),
            self.due_date.clone(),
            self.estimated_hours.map(|h| h.to_string()).unwrap_or_default(),
            self.priority_score.to_string(),
            self.created_at.clone(),
        ]
    }
}

/// Render tasks in the given format.
pub fn render(tasks: &[Task], format: ExportFormat) -> anyhow::Result<String> {
    let rows: Vec<ExportRow> = tasks.iter().map(ExportRow::from_task).collect();
    Ok(match format {
        ExportFormat::Csv => to_csv(&rows),
        ExportFormat::Json => serde_json::to_string_pretty(&rows)?,
        ExportFormat::Markdown => to_markdown(&rows),
    })
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = COLUMNS.join(",");
    out.push_str("\r\n");
    for row in rows {
        let line: Vec<String> = row.cells().iter().map(|c| csv_field(c)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

fn md_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

pub fn to_markdown(rows: &[ExportRow]) -> String {
    let mut out = String::from("# Task Report\n\n");
    if rows.is_empty() {
        out.push_str("_No tasks._\n");
        return out;
    }

    let _ = writeln!(out, "| {} |", COLUMNS.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(COLUMNS.len()));
    for row in rows {
        let cells: Vec<String> = row.cells().iter().map(|c| md_cell(c)).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, TaskStatus};
    use chrono::NaiveDate;

    fn task(title: &str) -> Task {
        let at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Task {
            id: 1,
            user_id: 1,
            title: title.to_string(),
            description: None,
            category: None,
            status: TaskStatus::InProgress,
            priority: Priority::Low,
            due_date: None,
            estimated_hours: Some(1.5),
            priority_score: 33.25,
            reminder_date: None,
            created_at: at,
        }
    }

    #[test]
    fn test_format_aliases() {
        assert_eq!(ExportFormat::parse("excel"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("XLSX"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("pdf"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("md"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("json"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse("docx"), None);
    }

    #[test]
    fn test_csv_quoting() {
        let csv = render(&[task("Buy milk, eggs"), task("Say \"hi\"")], ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "title,category,status,priority,due_date,estimated_hours,priority_score,created_at"
        );
        assert_eq!(
            lines[1],
            "\"Buy milk, eggs\",,in_progress,low,,1.5,33.25,2025-03-01T09:00:00"
        );
        assert!(lines[2].starts_with("\"Say \"\"hi\"\"\","));
    }

    #[test]
    fn test_json_rows() {
        let json = render(&[task("A")], ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["title"], "A");
        assert_eq!(value[0]["category"], "");
        assert_eq!(value[0]["estimated_hours"], 1.5);
    }

    #[test]
    fn test_markdown_table() {
        let md = render(&[task("a | b")], ExportFormat::Markdown).unwrap();
        assert!(md.starts_with("# Task Report\n\n| title | category |"));
        assert!(md.contains("| a \\| b |  | in_progress |"));

        let empty = render(&[], ExportFormat::Markdown).unwrap();
        assert!(empty.contains("_No tasks._"));
    }
}
