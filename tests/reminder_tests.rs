//! Reminder worker tests with in-memory notifiers.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskgenius::db::Database;
use taskgenius::notify::{Notifier, NotifyError, ReminderNotice};
use taskgenius::reminder::{ReminderReport, ReminderScheduler};
use taskgenius::types::{NewTask, TaskStatus};

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Records every notice it is asked to send.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<ReminderNotice>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Fails every delivery.
struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notice: &ReminderNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("relay unavailable".to_string()))
    }
}

/// Moves the reminder to a new time while the notice is being delivered,
/// the way an edit from the owner can land mid-cycle.
struct ReschedulingNotifier {
    db: Arc<Database>,
    user_id: i64,
    to: NaiveDateTime,
}

#[async_trait]
impl Notifier for ReschedulingNotifier {
    async fn send(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
        let mut task = self
            .db
            .get_task(self.user_id, notice.task_id)
            .unwrap()
            .unwrap();
        task.reminder_date = Some(self.to);
        assert!(self.db.save_task_with_reminder(&task).unwrap());
        Ok(())
    }
}

fn setup() -> (Arc<Database>, i64) {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let uid = db
        .create_user("owner@example.com", "x", at(1, 9))
        .unwrap()
        .unwrap()
        .id;
    (Arc::new(db), uid)
}

fn add_reminder(db: &Database, uid: i64, title: &str, when: NaiveDateTime) -> i64 {
    let task = NewTask {
        title: title.to_string(),
        due_date: Some(at(20, 17)),
        reminder_date: Some(when),
        ..Default::default()
    };
    db.create_task(uid, &task, 50.0, at(1, 9)).unwrap().id
}

fn scheduler(db: &Arc<Database>, notifier: Arc<dyn Notifier>) -> ReminderScheduler {
    ReminderScheduler::new(Arc::clone(db), notifier, Duration::from_secs(60))
}

#[tokio::test]
async fn due_reminder_is_sent_once_and_cleared() {
    let (db, uid) = setup();
    let id = add_reminder(&db, uid, "Pay rent", at(10, 8));
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = scheduler(&db, notifier.clone());

    let report = scheduler.run_cycle(at(10, 9)).await.unwrap();
    assert_eq!(
        report,
        ReminderReport {
            sent: 1,
            failed: 0,
            skipped: 0
        }
    );

    {
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@example.com");
        assert_eq!(sent[0].subject, "Reminder: Pay rent");
        assert_eq!(sent[0].task_id, id);
        assert!(sent[0].body.contains("Reminder Time: 2025-03-10T08:00:00"));
    }

    assert_eq!(db.get_task(uid, id).unwrap().unwrap().reminder_date, None);

    let second = scheduler.run_cycle(at(10, 10)).await.unwrap();
    assert_eq!(second, ReminderReport::default());
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn future_reminders_are_left_alone() {
    let (db, uid) = setup();
    let id = add_reminder(&db, uid, "Later", at(12, 8));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = scheduler(&db, notifier.clone())
        .run_cycle(at(10, 9))
        .await
        .unwrap();
    assert_eq!(report, ReminderReport::default());
    assert!(notifier.sent.lock().unwrap().is_empty());
    assert_eq!(
        db.get_task(uid, id).unwrap().unwrap().reminder_date,
        Some(at(12, 8))
    );
}

#[tokio::test]
async fn failed_delivery_keeps_reminder_for_retry() {
    let (db, uid) = setup();
    let id = add_reminder(&db, uid, "Flaky", at(10, 8));

    let report = scheduler(&db, Arc::new(FailingNotifier))
        .run_cycle(at(10, 9))
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 0);
    assert_eq!(
        db.get_task(uid, id).unwrap().unwrap().reminder_date,
        Some(at(10, 8))
    );

    // A working notifier picks it up on the next cycle.
    let notifier = Arc::new(RecordingNotifier::default());
    let report = scheduler(&db, notifier.clone())
        .run_cycle(at(10, 10))
        .await
        .unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(db.get_task(uid, id).unwrap().unwrap().reminder_date, None);
}

#[tokio::test]
async fn reminders_processed_in_time_order() {
    let (db, uid) = setup();
    add_reminder(&db, uid, "second", at(10, 7));
    add_reminder(&db, uid, "first", at(9, 7));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = scheduler(&db, notifier.clone())
        .run_cycle(at(10, 9))
        .await
        .unwrap();
    assert_eq!(report.sent, 2);

    let subjects: Vec<String> = notifier
        .sent
        .lock()
        .unwrap()
        .iter()
        .map(|n| n.subject.clone())
        .collect();
    assert_eq!(subjects, ["Reminder: first", "Reminder: second"]);
}

#[tokio::test]
async fn spawned_worker_runs_first_cycle_immediately() {
    let (db, uid) = setup();
    // Reminder in the distant past so the wall-clock cycle sees it.
    let id = add_reminder(&db, uid, "Old", at(1, 8));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut handle = scheduler(&db, notifier.clone()).spawn();
    let report = tokio::time::timeout(Duration::from_secs(5), handle.next_report())
        .await
        .expect("worker did not report in time")
        .expect("worker stopped");

    assert_eq!(report.sent, 1);
    assert_eq!(handle.last_report(), report);
    assert_eq!(db.get_task(uid, id).unwrap().unwrap().reminder_date, None);
    handle.shutdown();
}

#[tokio::test]
async fn owner_without_email_is_skipped_and_cleared() {
    let (db, _) = setup();
    let silent = db.create_user("", "x", at(1, 9)).unwrap().unwrap().id;
    let id = add_reminder(&db, silent, "No inbox", at(10, 8));
    let notifier = Arc::new(RecordingNotifier::default());

    let report = scheduler(&db, notifier.clone())
        .run_cycle(at(10, 9))
        .await
        .unwrap();
    assert_eq!(
        report,
        ReminderReport {
            sent: 0,
            failed: 0,
            skipped: 1
        }
    );
    assert!(notifier.sent.lock().unwrap().is_empty());
    assert_eq!(db.get_task(silent, id).unwrap().unwrap().reminder_date, None);
}

#[tokio::test]
async fn delivered_reminder_not_restored_by_later_edit() {
    let (db, uid) = setup();
    let id = add_reminder(&db, uid, "Standup", at(10, 8));
    // Loaded before delivery, saved after, like a slow PATCH.
    let mut stale = db.get_task(uid, id).unwrap().unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = scheduler(&db, notifier.clone());
    assert_eq!(scheduler.run_cycle(at(10, 9)).await.unwrap().sent, 1);

    stale.status = TaskStatus::InProgress;
    assert!(db.save_task(&stale).unwrap());

    assert!(db.due_reminders(at(10, 10)).unwrap().is_empty());
    let again = scheduler.run_cycle(at(10, 10)).await.unwrap();
    assert_eq!(again, ReminderReport::default());
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);

    let task = db.get_task(uid, id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.reminder_date, None);
}

#[tokio::test]
async fn reminder_rescheduled_during_delivery_is_kept() {
    let (db, uid) = setup();
    let id = add_reminder(&db, uid, "Call plumber", at(10, 8));
    let notifier = Arc::new(ReschedulingNotifier {
        db: Arc::clone(&db),
        user_id: uid,
        to: at(15, 8),
    });

    let report = scheduler(&db, notifier).run_cycle(at(10, 9)).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(
        db.get_task(uid, id).unwrap().unwrap().reminder_date,
        Some(at(15, 8))
    );
}

#[tokio::test]
async fn dropping_handle_stops_worker() {
    let (db, uid) = setup();
    let notifier = Arc::new(RecordingNotifier::default());

    let mut handle =
        ReminderScheduler::new(Arc::clone(&db), notifier.clone(), Duration::from_secs(1)).spawn();
    // First cycle runs right away with nothing due.
    let first = tokio::time::timeout(Duration::from_secs(5), handle.next_report())
        .await
        .expect("worker did not report in time")
        .expect("worker stopped");
    assert_eq!(first, ReminderReport::default());
    drop(handle);

    let id = add_reminder(&db, uid, "After shutdown", at(1, 8));
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(notifier.sent.lock().unwrap().is_empty());
    assert_eq!(
        db.get_task(uid, id).unwrap().unwrap().reminder_date,
        Some(at(1, 8))
    );
}
