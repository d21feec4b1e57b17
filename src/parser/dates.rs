//! Date and time-of-day expressions in free text.
//!
//! Scanners operate on ASCII-lowercased text so that byte offsets line up
//! with the original input. Every expression is resolved against a caller
//! supplied base timestamp; nothing here reads the clock.

use chrono::{
    DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday,
};
use regex_lite::{Captures, Regex};
use std::sync::LazyLock;

const MONTHS: &str = "january|jan|february|feb|march|mar|april|apr|may|june|jun|july|jul|\
                      august|aug|september|sept|sep|october|oct|november|nov|december|dec";

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})(?:[t ](\d{1,2}):(\d{2})(?::(\d{2}))?)?\b")
        .expect("valid regex")
});

static OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bin\s+(\d+(?:\.\d+)?|an?|one|two|three|four|five|six|seven|eight|nine|ten|twelve)\s+(minutes?|mins?|hours?|hrs?|days?|weeks?|months?)\b",
    )
    .expect("valid regex")
});

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(day after tomorrow|tomorrow|tmrw|today|tonight|next week|next month|next year)\b")
        .expect("valid regex")
});

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(next|this|on|coming)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b",
    )
    .expect("valid regex")
});

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid regex")
});

static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS})\b(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid regex")
});

static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").expect("valid regex")
});

/// A slash "date" directly followed by a unit is a fraction ("1/2 hour").
static UNIT_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:hours?|hrs?|h|minutes?|mins?|m|days?)\b").expect("valid regex")
});

static TIME_MERIDIEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(at|by)\s+)?\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m|p\.?m)\b\.?")
        .expect("valid regex")
});

static TIME_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(at|by)\s+)?\b(\d{1,2}):(\d{2})\b").expect("valid regex")
});

static TIME_BARE_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(at|by)\s+(\d{1,2})\b").expect("valid regex"));

static TIME_NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(at|by)\s+)?\b(noon|midday|midnight)\b").expect("valid regex")
});

/// A date expression found in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DateExpr {
    pub start: usize,
    pub end: usize,
    pub date: NaiveDate,
    /// Time-of-day implied by the expression itself ("tonight", "in 2 hours").
    pub time: Option<NaiveTime>,
    /// The expression pins an exact instant; a separate time phrase is ignored.
    pub exact: bool,
    /// Relative expressions keep the base time-of-day when no time is given.
    pub relative: bool,
}

/// A time-of-day expression found in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeExpr {
    pub start: usize,
    pub end: usize,
    pub time: NaiveTime,
    /// Introduced by "at" or "by".
    pub anchored: bool,
}

/// A resolved timestamp with the spans of text it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub value: NaiveDateTime,
    pub date_span: (usize, usize),
    pub time_span: Option<(usize, usize)>,
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

fn num(caps: &Captures, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

fn month_number(name: &str) -> Option<u32> {
    let m = match &name[..3.min(name.len())] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(m)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let day = match name {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn amount(word: &str) -> Option<f64> {
    let n = match word {
        "a" | "an" | "one" => 1.0,
        "two" => 2.0,
        "three" => 3.0,
        "four" => 4.0,
        "five" => 5.0,
        "six" => 6.0,
        "seven" => 7.0,
        "eight" => 8.0,
        "nine" => 9.0,
        "ten" => 10.0,
        "twelve" => 12.0,
        other => return other.parse().ok(),
    };
    Some(n)
}

/// Calendar date without a year: this year, or next year once it has passed.
fn upcoming_date(month: u32, day: u32, year: Option<i32>, base: NaiveDate) -> Option<NaiveDate> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    let this_year = NaiveDate::from_ymd_opt(base.year(), month, day);
    match this_year {
        Some(date) if date >= base => Some(date),
        _ => NaiveDate::from_ymd_opt(base.year() + 1, month, day),
    }
}

fn expand_year(raw: u32) -> i32 {
    if raw < 100 { 2000 + raw as i32 } else { raw as i32 }
}

fn scan_iso(text: &str) -> Option<DateExpr> {
    ISO_DATE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let date = NaiveDate::from_ymd_opt(caps[1].parse().ok()?, num(&caps, 2)?, num(&caps, 3)?)?;
        let time = match (num(&caps, 4), num(&caps, 5)) {
            (Some(h), Some(m)) => Some(NaiveTime::from_hms_opt(h, m, num(&caps, 6).unwrap_or(0))?),
            _ => None,
        };
        Some(DateExpr {
            start: whole.start(),
            end: whole.end(),
            date,
            time,
            exact: time.is_some(),
            relative: false,
        })
    })
}

fn scan_offset(text: &str, base: NaiveDateTime) -> Option<DateExpr> {
    OFFSET.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let n = amount(&caps[1])?;
        let unit = &caps[2];

        let (value, exact) = if unit.starts_with("mon") {
            if n.fract() != 0.0 {
                return None;
            }
            (base.checked_add_months(Months::new(n as u32))?, false)
        } else {
            let unit_secs = if unit.starts_with("min") {
                60.0
            } else if unit.starts_with('h') {
                3600.0
            } else if unit.starts_with('d') {
                86_400.0
            } else {
                604_800.0
            };
            let exact = unit_secs < 86_400.0 || n.fract() != 0.0;
            let secs = (n * unit_secs).round() as i64;
            (base.checked_add_signed(Duration::try_seconds(secs)?)?, exact)
        };

        Some(DateExpr {
            start: whole.start(),
            end: whole.end(),
            date: value.date(),
            time: exact.then(|| value.time()),
            exact,
            relative: true,
        })
    })
}

fn scan_keyword(text: &str, base: NaiveDateTime) -> Option<DateExpr> {
    let caps = KEYWORD.captures(text)?;
    let whole = caps.get(0)?;
    let today = base.date();
    let (date, time) = match &caps[1] {
        "today" => (today, None),
        "tonight" => (today, NaiveTime::from_hms_opt(20, 0, 0)),
        "tomorrow" | "tmrw" => (today.succ_opt()?, None),
        "day after tomorrow" => (today.checked_add_signed(Duration::days(2))?, None),
        "next week" => (today.checked_add_signed(Duration::days(7))?, None),
        "next month" => (today.checked_add_months(Months::new(1))?, None),
        "next year" => (today.checked_add_months(Months::new(12))?, None),
        _ => return None,
    };
    Some(DateExpr {
        start: whole.start(),
        end: whole.end(),
        date,
        time,
        exact: false,
        relative: true,
    })
}

fn scan_weekday(text: &str, base: NaiveDateTime) -> Option<DateExpr> {
    let caps = WEEKDAY.captures(text)?;
    let whole = caps.get(0)?;
    let target = weekday_from_name(&caps[2])?;
    let today = base.date();

    let mut ahead = (target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let allow_today = caps.get(1).is_some_and(|m| m.as_str() == "this");
    if ahead == 0 && !allow_today {
        ahead = 7;
    }

    Some(DateExpr {
        start: whole.start(),
        end: whole.end(),
        date: today.checked_add_signed(Duration::days(ahead))?,
        time: None,
        exact: false,
        relative: true,
    })
}

fn scan_month_names(text: &str, base: NaiveDateTime) -> Option<DateExpr> {
    let month_day = MONTH_DAY.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let month = month_number(&caps[1])?;
        let year = num(&caps, 3).map(expand_year);
        let date = upcoming_date(month, num(&caps, 2)?, year, base.date())?;
        Some((whole.start(), whole.end(), date))
    });
    let day_month = DAY_MONTH.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let month = month_number(&caps[2])?;
        let year = num(&caps, 3).map(expand_year);
        let date = upcoming_date(month, num(&caps, 1)?, year, base.date())?;
        Some((whole.start(), whole.end(), date))
    });

    let (start, end, date) = match (month_day, day_month) {
        (Some(a), Some(b)) => {
            if b.0 < a.0 {
                b
            } else {
                a
            }
        }
        (a, b) => a.or(b)?,
    };
    Some(DateExpr {
        start,
        end,
        date,
        time: None,
        exact: false,
        relative: false,
    })
}

fn scan_slash(text: &str, base: NaiveDateTime) -> Option<DateExpr> {
    SLASH_DATE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        if UNIT_TAIL.is_match(&text[whole.end()..]) {
            return None;
        }
        let year = num(&caps, 3).map(expand_year);
        let date = upcoming_date(num(&caps, 1)?, num(&caps, 2)?, year, base.date())?;
        Some(DateExpr {
            start: whole.start(),
            end: whole.end(),
            date,
            time: None,
            exact: false,
            relative: false,
        })
    })
}

/// Find the earliest date expression in `text`. On a tie the longer
/// expression wins.
pub(crate) fn find_date(text: &str, base: NaiveDateTime) -> Option<DateExpr> {
    [
        scan_iso(text),
        scan_offset(text, base),
        scan_keyword(text, base),
        scan_weekday(text, base),
        scan_month_names(text, base),
        scan_slash(text, base),
    ]
    .into_iter()
    .flatten()
    .min_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)))
}

fn meridiem_time(caps: &Captures) -> Option<NaiveTime> {
    let hour = num(caps, 2)?;
    let minute = num(caps, 3).unwrap_or(0);
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = caps[4].starts_with('p');
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// All non-overlapping time-of-day expressions in `text`, in order.
pub(crate) fn find_times(text: &str) -> Vec<TimeExpr> {
    let mut found: Vec<TimeExpr> = Vec::new();

    let mut collect = |re: &Regex, to_time: &dyn Fn(&Captures) -> Option<NaiveTime>| {
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if let Some(time) = to_time(&caps) {
                found.push(TimeExpr {
                    start: whole.start(),
                    end: whole.end(),
                    time,
                    anchored: caps.get(1).is_some(),
                });
            }
        }
    };

    collect(&TIME_MERIDIEM, &meridiem_time);
    collect(&TIME_CLOCK, &|caps| NaiveTime::from_hms_opt(num(caps, 2)?, num(caps, 3)?, 0));
    collect(&TIME_BARE_HOUR, &|caps| NaiveTime::from_hms_opt(num(caps, 2)?, 0, 0));
    collect(&TIME_NAMED, &|caps| match &caps[2] {
        "midnight" => NaiveTime::from_hms_opt(0, 0, 0),
        _ => NaiveTime::from_hms_opt(12, 0, 0),
    });

    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut result: Vec<TimeExpr> = Vec::new();
    for expr in found {
        if result
            .last()
            .is_some_and(|prev| overlaps((prev.start, prev.end), (expr.start, expr.end)))
        {
            continue;
        }
        result.push(expr);
    }
    result
}

/// Resolve the first date expression in `text`, attaching the first time
/// expression outside it. Bare times without a date yield `None`.
pub(crate) fn resolve_date(text: &str, base: NaiveDateTime) -> Option<Resolved> {
    let date = find_date(text, base)?;
    let date_span = (date.start, date.end);

    if date.exact {
        return Some(Resolved {
            value: date.date.and_time(date.time.unwrap_or(base.time())),
            date_span,
            time_span: None,
        });
    }

    let time = find_times(text)
        .into_iter()
        .find(|t| !overlaps((t.start, t.end), date_span));

    let (value, time_span) = match (time, date.time) {
        (Some(t), _) => (date.date.and_time(t.time), Some((t.start, t.end))),
        (None, Some(implied)) => (date.date.and_time(implied), None),
        (None, None) if date.relative => (date.date.and_time(base.time()), None),
        (None, None) => (date.date.and_hms_opt(0, 0, 0)?, None),
    };

    Some(Resolved {
        value,
        date_span,
        time_span,
    })
}

/// Resolve a free-form phrase: a date (with optional time) or, failing
/// that, a bare time on the base date.
pub(crate) fn resolve_phrase(text: &str, base: NaiveDateTime) -> Option<NaiveDateTime> {
    if let Some(resolved) = resolve_date(text, base) {
        return Some(resolved.value);
    }
    find_times(text)
        .first()
        .map(|t| base.date().and_time(t.time))
}

/// Parse an ISO-8601 timestamp from API input.
///
/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DDTHH:MM[:SS[.f]]` with `T` or
/// a space, and RFC 3339 timestamps with an offset, which are converted to
/// local time.
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wednesday, 2025-03-12 10:30.
    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 12)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn resolve(text: &str) -> Option<NaiveDateTime> {
        resolve_date(text, base()).map(|r| r.value)
    }

    #[test]
    fn test_relative_day_keeps_time_of_day() {
        assert_eq!(resolve("finish tomorrow"), Some(dt(2025, 3, 13, 10, 30)));
        assert_eq!(resolve("day after tomorrow"), Some(dt(2025, 3, 14, 10, 30)));
        assert_eq!(resolve("next week"), Some(dt(2025, 3, 19, 10, 30)));
    }

    #[test]
    fn test_relative_day_with_time() {
        assert_eq!(resolve("tomorrow at 5pm"), Some(dt(2025, 3, 13, 17, 0)));
        assert_eq!(resolve("5:45 pm tomorrow"), Some(dt(2025, 3, 13, 17, 45)));
        assert_eq!(resolve("tomorrow by 9"), Some(dt(2025, 3, 13, 9, 0)));
        assert_eq!(resolve("tomorrow at noon"), Some(dt(2025, 3, 13, 12, 0)));
        assert_eq!(resolve("tonight"), Some(dt(2025, 3, 12, 20, 0)));
        assert_eq!(resolve("tonight at 11pm"), Some(dt(2025, 3, 12, 23, 0)));
    }

    #[test]
    fn test_weekday_is_strictly_future() {
        // Base is a Wednesday.
        assert_eq!(resolve("on friday"), Some(dt(2025, 3, 14, 10, 30)));
        assert_eq!(resolve("wednesday"), Some(dt(2025, 3, 19, 10, 30)));
        assert_eq!(resolve("this wednesday"), Some(dt(2025, 3, 12, 10, 30)));
        assert_eq!(resolve("next monday at 9am"), Some(dt(2025, 3, 17, 9, 0)));
    }

    #[test]
    fn test_calendar_dates() {
        assert_eq!(resolve("due march 20"), Some(dt(2025, 3, 20, 0, 0)));
        assert_eq!(resolve("due 20th of march"), Some(dt(2025, 3, 20, 0, 0)));
        assert_eq!(resolve("by jan 5"), Some(dt(2026, 1, 5, 0, 0)));
        assert_eq!(resolve("on 4/1 at 3pm"), Some(dt(2025, 4, 1, 15, 0)));
        assert_eq!(resolve("on 12/25/2026"), Some(dt(2026, 12, 25, 0, 0)));
        assert_eq!(resolve("2025-06-01"), Some(dt(2025, 6, 1, 0, 0)));
        assert_eq!(resolve("2025-06-01 14:15"), Some(dt(2025, 6, 1, 14, 15)));
        assert_eq!(resolve("2025-06-01t08:00"), Some(dt(2025, 6, 1, 8, 0)));
    }

    #[test]
    fn test_offsets() {
        assert_eq!(resolve("in 2 hours"), Some(dt(2025, 3, 12, 12, 30)));
        assert_eq!(resolve("in an hour"), Some(dt(2025, 3, 12, 11, 30)));
        assert_eq!(resolve("in 30 minutes"), Some(dt(2025, 3, 12, 11, 0)));
        assert_eq!(resolve("in 3 days"), Some(dt(2025, 3, 15, 10, 30)));
        assert_eq!(resolve("in 3 days at 8am"), Some(dt(2025, 3, 15, 8, 0)));
        assert_eq!(resolve("in two weeks"), Some(dt(2025, 3, 26, 10, 30)));
    }

    #[test]
    fn test_non_dates_are_ignored() {
        assert_eq!(resolve("buy milk"), None);
        assert_eq!(resolve("may need 3d printing"), None);
        assert_eq!(resolve("spend 1/2 hour on it"), None);
        assert_eq!(resolve("at 5pm"), None);
        assert_eq!(resolve("marketing 5 slides"), None);
    }

    #[test]
    fn test_earliest_expression_wins() {
        assert_eq!(resolve("friday or maybe tomorrow"), Some(dt(2025, 3, 14, 10, 30)));
    }

    #[test]
    fn test_find_times() {
        let times = find_times("call at 9:00pm, then by 7 and 13:30, not 2 amounts");
        let values: Vec<_> = times.iter().map(|t| (t.time, t.anchored)).collect();
        assert_eq!(
            values,
            vec![
                (NaiveTime::from_hms_opt(21, 0, 0).unwrap(), true),
                (NaiveTime::from_hms_opt(7, 0, 0).unwrap(), true),
                (NaiveTime::from_hms_opt(13, 30, 0).unwrap(), false),
            ]
        );
    }

    #[test]
    fn test_meridiem_edges() {
        let t = |s: &str| find_times(s).first().map(|t| t.time);
        assert_eq!(t("12am"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(t("12 pm"), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(t("7 a.m."), NaiveTime::from_hms_opt(7, 0, 0));
        assert_eq!(t("13pm"), None);
    }

    #[test]
    fn test_resolve_phrase_time_only_uses_base_date() {
        assert_eq!(
            resolve_phrase("8:15 am please", base()),
            Some(dt(2025, 3, 12, 8, 15))
        );
        assert_eq!(resolve_phrase("whenever", base()), None);
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(parse_datetime("2025-03-14"), Some(dt(2025, 3, 14, 0, 0)));
        assert_eq!(parse_datetime("2025-03-14T09:05"), Some(dt(2025, 3, 14, 9, 5)));
        assert_eq!(parse_datetime("2025-03-14T09:05:00"), Some(dt(2025, 3, 14, 9, 5)));
        assert_eq!(
            parse_datetime("2025-03-14 09:05:00.250").map(|d| d.date()),
            Some(dt(2025, 3, 14, 0, 0).date())
        );
        assert!(parse_datetime("2025-03-14T09:05:00+02:00").is_some());
        assert_eq!(parse_datetime("next friday"), None);
        assert_eq!(parse_datetime(""), None);
    }
}
