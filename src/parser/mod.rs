//! Natural-language task entry.
//!
//! Turns a sentence like "Finish the report tomorrow at 5pm, urgent, 2h"
//! into structured task fields and picks a reminder time for it.
//!
//! # Reminder precedence
//!
//! 1. An explicit clause ("remind me at 3pm") resolved against the due date
//!    (or now), kept only if it is not after the due date.
//! 2. A time-only phrase ("by 9pm") not already used for the due date.
//! 3. Two hours before the due date.
//!
//! Whatever wins is dropped when it is less than a minute away.

pub mod dates;

use crate::types::Priority;
use chrono::{Duration, NaiveDateTime, Timelike};
use regex_lite::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub use dates::parse_datetime;

/// Minutes before the due date at which the default reminder fires.
pub const DEFAULT_REMINDER_LEAD_MINUTES: i64 = 120;

/// Reminders closer than this many seconds to "now" are not scheduled.
pub const MIN_REMINDER_DELAY_SECS: i64 = 60;

/// Priority keywords, checked in this order; the first level with a hit wins.
const PRIORITY_WORDS: [(Priority, &[&str]); 3] = [
    (Priority::Low, &["sometime", "whenever", "low", "later"]),
    (Priority::Medium, &["should", "normal", "medium"]),
    (
        Priority::High,
        &["urgent", "asap", "important", "high", "immediately", "today"],
    ),
];

/// Category keywords, checked in this order.
const CATEGORIES: [(&str, &[&str]); 3] = [
    (
        "work",
        &["report", "meeting", "email", "presentation", "deploy", "bug"],
    ),
    (
        "study",
        &["assignment", "homework", "study", "exam", "course"],
    ),
    (
        "personal",
        &["gym", "shopping", "groceries", "doctor", "call"],
    ),
];

static REMINDER_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(remind\s+me|notify\s+me|alert\s+me)\s+(at|on|by)\s+(.+)").expect("valid regex")
});

static ESTIMATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(in)\s+)?(\d+(?:\.\d+)?)\s*(hours?|hrs?|h|minutes?|mins?|m)\b")
        .expect("valid regex")
});

static TOMORROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btomorrow\b").expect("valid regex"));

/// Structured fields extracted from free text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTask {
    pub title: String,
    pub priority: Priority,
    pub category: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub estimated_hours: Option<f64>,
    pub reminder_date: Option<NaiveDateTime>,
}

fn words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn detect_priority(tokens: &[&str]) -> Priority {
    PRIORITY_WORDS
        .iter()
        .find(|(_, list)| list.iter().any(|w| tokens.contains(w)))
        .map(|(level, _)| *level)
        .unwrap_or_default()
}

fn detect_category(tokens: &[&str]) -> Option<String> {
    let matches = |keyword: &str| {
        tokens.iter().any(|t| {
            *t == keyword
                || t.strip_suffix('s') == Some(keyword)
                || t.strip_suffix("es") == Some(keyword)
        })
    };
    CATEGORIES
        .iter()
        .find(|(_, list)| list.iter().any(|w| matches(*w)))
        .map(|(name, _)| name.to_string())
}

fn detect_estimate(lower: &str) -> Option<f64> {
    ESTIMATE.captures_iter(lower).find_map(|caps| {
        if caps.get(1).is_some() {
            return None;
        }
        let amount: f64 = caps[2].parse().ok()?;
        if caps[3].starts_with('h') {
            Some(amount)
        } else {
            Some(amount / 60.0)
        }
    })
}

fn build_title(text: &str, clause_start: Option<usize>) -> String {
    let trimmed = text.trim();
    let head = text[..clause_start.unwrap_or(text.len())]
        .trim_end_matches(|c: char| {
            c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '.' | '!' | '?')
        })
        .trim();
    if head.is_empty() {
        trimmed.to_string()
    } else {
        head.to_string()
    }
}

/// Parse free-form task text relative to `now`.
pub fn parse_task_text(text: &str, now: NaiveDateTime) -> ParsedTask {
    let now = now.with_nanosecond(0).unwrap_or(now);
    let lower = text.to_ascii_lowercase();
    let tokens = words(&lower);

    let clause = REMINDER_CLAUSE.captures(&lower);
    let clause_start = clause.as_ref().and_then(|c| c.get(0)).map(|m| m.start());
    let scan_region = &lower[..clause_start.unwrap_or(lower.len())];

    let due = dates::resolve_date(scan_region, now);
    let mut due_date = due.map(|r| r.value);
    if due_date.is_none() && TOMORROW.is_match(&lower) {
        due_date = Some(now + Duration::days(1));
    }

    let mut reminder_date = None;

    if let Some(phrase) = clause.as_ref().and_then(|c| c.get(3)) {
        let base = due_date.unwrap_or(now);
        if let Some(candidate) = dates::resolve_phrase(phrase.as_str().trim(), base) {
            if due_date.is_none_or(|due| candidate <= due) {
                reminder_date = Some(candidate);
            }
        }
    }

    if reminder_date.is_none() {
        let consumed = due.and_then(|r| r.time_span);
        let date_span = due.map(|r| r.date_span);
        let time_only = dates::find_times(&lower).into_iter().find(|t| {
            t.anchored
                && consumed != Some((t.start, t.end))
                && !date_span.is_some_and(|(s, e)| t.start < e && s < t.end)
        });
        if let Some(t) = time_only {
            match due_date {
                Some(due) => {
                    let candidate = due.date().and_time(t.time);
                    if candidate <= due {
                        reminder_date = Some(candidate);
                    }
                }
                None => {
                    let candidate = now.date().and_time(t.time);
                    reminder_date = Some(if candidate <= now {
                        candidate + Duration::days(1)
                    } else {
                        candidate
                    });
                }
            }
        }
    }

    if reminder_date.is_none() {
        reminder_date = due_date.map(|due| due - Duration::minutes(DEFAULT_REMINDER_LEAD_MINUTES));
    }

    if reminder_date.is_some_and(|r| r < now + Duration::seconds(MIN_REMINDER_DELAY_SECS)) {
        reminder_date = None;
    }

    ParsedTask {
        title: build_title(text, clause_start),
        priority: detect_priority(&tokens),
        category: detect_category(&tokens),
        due_date,
        estimated_hours: detect_estimate(&lower),
        reminder_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Wednesday, 2025-03-12 10:30.
    fn now() -> NaiveDateTime {
        dt(2025, 3, 12, 10, 30)
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn parse(text: &str) -> ParsedTask {
        parse_task_text(text, now())
    }

    #[test]
    fn test_plain_text_has_defaults() {
        let parsed = parse("  Buy a new lamp  ");
        assert_eq!(parsed.title, "Buy a new lamp");
        assert_eq!(parsed.priority, Priority::Medium);
        assert_eq!(parsed.category, None);
        assert_eq!(parsed.due_date, None);
        assert_eq!(parsed.estimated_hours, None);
        assert_eq!(parsed.reminder_date, None);
    }

    #[test]
    fn test_title_drops_trailing_punctuation() {
        assert_eq!(parse("Buy milk.").title, "Buy milk");
        assert_eq!(parse("Call the bank!  ").title, "Call the bank");
        assert_eq!(parse("Book hotel, remind me at 9am.").title, "Book hotel");
        assert_eq!(parse("...").title, "...");
    }

    #[test]
    fn test_empty_text() {
        let parsed = parse("");
        assert_eq!(parsed.title, "");
        assert_eq!(parsed.priority, Priority::Medium);
        assert_eq!(parsed.reminder_date, None);
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(parse("Fix the login bug ASAP").priority, Priority::High);
        assert_eq!(parse("clean garage whenever").priority, Priority::Low);
        assert_eq!(parse("we should water plants").priority, Priority::Medium);
    }

    #[test]
    fn test_priority_order_low_before_high() {
        assert_eq!(parse("urgent but can be done later").priority, Priority::Low);
        assert_eq!(parse("should do it today").priority, Priority::Medium);
    }

    #[test]
    fn test_priority_matches_whole_words() {
        // "follow" contains "low" but is not the word "low".
        assert_eq!(parse("follow up with Sam urgently").priority, Priority::Medium);
    }

    #[test]
    fn test_categories() {
        assert_eq!(parse("Prepare quarterly report").category.as_deref(), Some("work"));
        assert_eq!(parse("two meetings with design").category.as_deref(), Some("work"));
        assert_eq!(parse("math homework").category.as_deref(), Some("study"));
        assert_eq!(parse("buy groceries").category.as_deref(), Some("personal"));
        assert_eq!(parse("email the doctor").category.as_deref(), Some("work"));
        assert_eq!(parse("recall the details").category, None);
    }

    #[test]
    fn test_estimate() {
        assert_eq!(parse("write docs 3h").estimated_hours, Some(3.0));
        assert_eq!(parse("write docs, about 1.5 hours").estimated_hours, Some(1.5));
        assert_eq!(parse("stretch 30 min").estimated_hours, Some(0.5));
        assert_eq!(parse("ping Bob in 2 hours").estimated_hours, None);
        assert_eq!(parse("ping Bob in 2 hours, takes 1 hr").estimated_hours, Some(1.0));
    }

    #[test]
    fn test_due_date_with_default_reminder() {
        let parsed = parse("Submit report tomorrow at 5pm");
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 13, 17, 0)));
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 13, 15, 0)));
        assert_eq!(parsed.category.as_deref(), Some("work"));
    }

    #[test]
    fn test_explicit_reminder_before_due() {
        let parsed = parse("Submit report on friday at 5pm, remind me at 9am");
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 14, 17, 0)));
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 14, 9, 0)));
        assert_eq!(parsed.title, "Submit report on friday at 5pm");
    }

    #[test]
    fn test_explicit_reminder_after_due_falls_back() {
        let parsed = parse("Submit report friday at 5pm, remind me at 8pm");
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 14, 17, 0)));
        // 8pm on the due day is after the deadline, both as a clause and as
        // a time-only phrase, so the two-hour fallback applies.
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 14, 15, 0)));
    }

    #[test]
    fn test_explicit_reminder_without_due() {
        let parsed = parse("Water plants, notify me at 6pm");
        assert_eq!(parsed.due_date, None);
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 12, 18, 0)));
        assert_eq!(parsed.title, "Water plants");
    }

    #[test]
    fn test_explicit_reminder_with_date() {
        let parsed = parse("Renew passport, alert me on march 20 at 10am");
        assert_eq!(parsed.due_date, None);
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 20, 10, 0)));
    }

    #[test]
    fn test_time_only_phrase_without_due_rolls_forward() {
        // 9am has already passed today.
        let parsed = parse("Call mom at 9am");
        assert_eq!(parsed.due_date, None);
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 13, 9, 0)));

        let parsed = parse("Call mom by 9:00pm");
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 12, 21, 0)));
    }

    #[test]
    fn test_second_time_phrase_becomes_reminder() {
        let parsed = parse("Deploy tomorrow at 5pm, start by 3pm");
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 13, 17, 0)));
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 13, 15, 0)));

        let parsed = parse("Deploy tomorrow at 5pm, start by 1pm");
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 13, 13, 0)));
    }

    #[test]
    fn test_past_reminder_is_dropped() {
        // Due in 90 minutes: the two-hour lead would be in the past.
        let parsed = parse("Stand-up notes in 90 minutes");
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 12, 12, 0)));
        assert_eq!(parsed.reminder_date, None);
    }

    #[test]
    fn test_today_is_high_priority_and_due() {
        let parsed = parse("Pay rent today at 6pm");
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 12, 18, 0)));
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 12, 16, 0)));
    }

    #[test]
    fn test_tomorrow_inside_reminder_clause_still_sets_due() {
        let parsed = parse("Pick up parcel, remind me at 9am tomorrow");
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 13, 10, 30)));
        assert_eq!(parsed.reminder_date, Some(dt(2025, 3, 13, 9, 0)));
    }

    #[test]
    fn test_nanoseconds_are_truncated() {
        let now = now() + Duration::nanoseconds(123);
        let parsed = parse_task_text("gym tomorrow", now);
        assert_eq!(parsed.due_date, Some(dt(2025, 3, 13, 10, 30)));
    }

    #[test]
    fn test_serializes_iso_dates() {
        let parsed = parse("gym tomorrow at 7am");
        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json["due_date"], "2025-03-13T07:00:00");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["category"], "personal");
    }
}
