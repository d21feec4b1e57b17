//! Reminder delivery.

use crate::config::MailConfig;
use crate::types::{Task, format_datetime};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail.from_email is required when mail.outbox_dir is set")]
    MissingSender,
    #[error("failed to write reminder to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A reminder ready to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderNotice {
    pub task_id: i64,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ReminderNotice {
    pub fn from_task(task: &Task, to: impl Into<String>) -> Self {
        let when = |dt: Option<NaiveDateTime>| {
            dt.as_ref()
                .map(format_datetime)
                .unwrap_or_else(|| "-".to_string())
        };

        let body = [
            format!("Title: {}", task.title),
            format!(
                "Description: {}",
                task.description.as_deref().filter(|d| !d.is_empty()).unwrap_or("-")
            ),
            format!("Priority: {}", task.priority),
            format!("Due: {}", when(task.due_date)),
            format!("Reminder Time: {}", when(task.reminder_date)),
        ]
        .join("\n");

        Self {
            task_id: task.id,
            to: to.into(),
            subject: format!("Reminder: {}", task.title),
            body,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &ReminderNotice) -> Result<(), NotifyError>;
}

/// Writes reminders to the log. Used when no outbox is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
        info!(
            to = %notice.to,
            task_id = notice.task_id,
            subject = %notice.subject,
            "Reminder\n{}",
            notice.body
        );
        Ok(())
    }
}

/// Writes each reminder as an RFC 5322 message into a directory, for pickup
/// by a mail relay.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
    from: String,
}

impl OutboxNotifier {
    pub fn new(dir: impl Into<PathBuf>, from_name: &str, from_email: &str) -> Self {
        let from = if from_name.is_empty() {
            from_email.to_string()
        } else {
            format!("{} <{}>", from_name, from_email)
        };
        Self {
            dir: dir.into(),
            from,
        }
    }

    fn render(&self, notice: &ReminderNotice) -> String {
        let date = Local::now().to_rfc2822();
        let body = notice.body.replace('\n', "\r\n");
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.from,
            notice.to,
            header_value(&notice.subject),
            date,
            body
        )
    }
}

/// A single `local@domain` address that fits on one header line.
fn is_deliverable(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.contains(|c: char| c.is_whitespace() || c.is_control() || c == ',')
        }
        None => false,
    }
}

/// Header values must stay on one line.
fn header_value(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
        if !is_deliverable(&notice.to) {
            return Err(NotifyError::Delivery(format!(
                "invalid recipient address '{}'",
                header_value(&notice.to)
            )));
        }

        let write_err =
            |path: PathBuf| move |source: std::io::Error| NotifyError::Write { path, source };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_err(self.dir.clone()))?;

        let stamp = Local::now().format("%Y%m%dT%H%M%S%3f");
        let path = self.dir.join(format!("{}-{}.eml", stamp, notice.task_id));
        tokio::fs::write(&path, self.render(notice))
            .await
            .map_err(write_err(path.clone()))?;

        info!(to = %notice.to, path = %path.display(), "Reminder queued");
        Ok(())
    }
}

/// Outbox when `mail.outbox_dir` is set, log otherwise.
pub fn build_notifier(config: &MailConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.outbox_dir {
        Some(dir) => {
            let from = config
                .from_email
                .as_deref()
                .filter(|e| !e.is_empty())
                .ok_or(NotifyError::MissingSender)?;
            Ok(Arc::new(OutboxNotifier::new(dir, &config.from_name, from)))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}
