//! Background reminder delivery.
//!
//! Each cycle looks for tasks whose reminder time has passed, hands them to
//! the [`Notifier`] and clears the reminder once it has been delivered. A
//! failed delivery keeps the reminder so the next cycle tries again.

use crate::db::{Database, now_local};
use crate::notify::{Notifier, ReminderNotice};
use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Outcome of one reminder cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    /// Delivered and cleared.
    pub sent: usize,
    /// Delivery failed; kept for the next cycle.
    pub failed: usize,
    /// Owner has no email; cleared without delivery.
    pub skipped: usize,
}

pub struct ReminderScheduler {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(db: Arc<Database>, notifier: Arc<dyn Notifier>, interval: Duration) -> Self {
        Self {
            db,
            notifier,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Process every reminder due at `now`.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> Result<ReminderReport> {
        let due = self.db.due_reminders(now)?;
        let mut report = ReminderReport::default();

        for item in due {
            let task_id = item.task.id;
            let Some(reminder_at) = item.task.reminder_date else {
                continue;
            };
            let Some(email) = item.email else {
                debug!(task_id, "Owner has no email, dropping reminder");
                self.db.clear_reminder(task_id, reminder_at)?;
                report.skipped += 1;
                continue;
            };

            let notice = ReminderNotice::from_task(&item.task, email);
            match self.notifier.send(&notice).await {
                Ok(()) => {
                    if !self.db.clear_reminder(task_id, reminder_at)? {
                        debug!(task_id, "Reminder was rescheduled during delivery");
                    }
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(task_id, "Reminder delivery failed, will retry: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report != ReminderReport::default() {
            info!(
                sent = report.sent,
                failed = report.failed,
                skipped = report.skipped,
                "Reminder cycle complete"
            );
        }
        Ok(report)
    }

    /// Run cycles on a fixed interval until the returned handle is shut down
    /// or dropped. The first cycle runs immediately.
    pub fn spawn(self) -> ReminderHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (report_tx, report_rx) = watch::channel(ReminderReport::default());

        info!(interval_secs = self.interval.as_secs(), "Reminder worker started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Reminder worker shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.run_cycle(now_local()).await {
                            Ok(report) => {
                                let _ = report_tx.send(report);
                            }
                            // Never fatal; the next tick retries.
                            Err(e) => error!("Reminder cycle failed: {:#}", e),
                        }
                    }
                }
            }
        });

        ReminderHandle {
            shutdown_tx: Some(shutdown_tx),
            report_rx,
        }
    }
}

/// Handle for the background reminder worker. Dropping it stops the worker.
pub struct ReminderHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    report_rx: watch::Receiver<ReminderReport>,
}

impl ReminderHandle {
    /// Report from the most recent successful cycle.
    pub fn last_report(&self) -> ReminderReport {
        *self.report_rx.borrow()
    }

    /// Wait until the next cycle completes.
    pub async fn next_report(&mut self) -> Option<ReminderReport> {
        self.report_rx.changed().await.ok()?;
        Some(*self.report_rx.borrow_and_update())
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
