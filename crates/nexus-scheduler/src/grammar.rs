//! The `when` free-text grammar (SPEC_FULL.md §6, exact BNF):
//!
//! ```text
//! WHEN    := WEEKLY | DAILY | WEEKDAY | ABSOLUTE
//! WEEKLY  := "every " DAY " at " TIME
//! DAILY   := "every day at " TIME
//! WEEKDAY := "every weekday at " TIME
//! ABSOLUTE:= any string parseable as a date/time; naive -> configured TZ
//! DAY     := "monday" | "tuesday" | … | "sunday"
//! TIME    := any string parseable as a time of day
//! ```
//!
//! Matching is case-insensitive after trim. The three recurring grammars
//! are tried in order (weekly, daily, weekday); anything else falls
//! through to the absolute date/time parser. Ported from the regex cascade
//! in `examples/original_source/nexus/tools/scheduler.py::_parse_trigger`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, SchedulerError};
use crate::schedule::Schedule;

fn weekly_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^every\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\s+at\s+(.+)$",
        )
        .unwrap()
    })
}

fn daily_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^every\s+day\s+at\s+(.+)$").unwrap())
}

fn weekday_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^every\s+weekday\s+at\s+(.+)$").unwrap())
}

fn day_index(day: &str) -> u8 {
    match day.to_lowercase().as_str() {
        "monday" => 0,
        "tuesday" => 1,
        "wednesday" => 2,
        "thursday" => 3,
        "friday" => 4,
        "saturday" => 5,
        "sunday" => 6,
        _ => 0,
    }
}

/// Parse a `when` string into a [`Schedule`] per the grammar above.
pub fn parse_when(when_text: &str, tz: Tz) -> Result<Schedule> {
    let trimmed = when_text.trim();

    if let Some(caps) = weekly_re().captures(trimmed) {
        let day = day_index(&caps[1]);
        let (hour, minute) = parse_time_of_day(&caps[2])
            .ok_or_else(|| SchedulerError::InvalidWhen(when_text.to_string()))?;
        return Ok(Schedule::Weekly { day, hour, minute });
    }

    if let Some(caps) = daily_re().captures(trimmed) {
        let (hour, minute) = parse_time_of_day(&caps[1])
            .ok_or_else(|| SchedulerError::InvalidWhen(when_text.to_string()))?;
        return Ok(Schedule::Daily { hour, minute });
    }

    if let Some(caps) = weekday_re().captures(trimmed) {
        let (hour, minute) = parse_time_of_day(&caps[1])
            .ok_or_else(|| SchedulerError::InvalidWhen(when_text.to_string()))?;
        return Ok(Schedule::Weekday { hour, minute });
    }

    let at = parse_absolute(trimmed, tz)
        .ok_or_else(|| SchedulerError::InvalidWhen(when_text.to_string()))?;
    Ok(Schedule::Absolute { at })
}

/// Parse a free-text time of day like `"8:00"`, `"8:00am"`, `"8am"`, `"20:00"`.
fn parse_time_of_day(text: &str) -> Option<(u8, u8)> {
    let t = text.trim();
    for fmt in ["%H:%M", "%I:%M%p", "%I:%M %p", "%I%p", "%I %p"] {
        if let Ok(parsed) = NaiveTime::parse_from_str(&t.to_uppercase(), fmt) {
            return Some((parsed.format("%H").to_string().parse().ok()?, parsed.format("%M").to_string().parse().ok()?));
        }
    }
    None
}

/// Parse an absolute date/time string, localizing a naive result to `tz`.
/// Accepts RFC3339 and a handful of common "YYYY-MM-DD HH:MM[:SS]" shapes.
fn parse_absolute(text: &str, tz: Tz) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return localize(naive, tz);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return localize(naive, tz);
    }
    None
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<chrono::DateTime<chrono::Utc>> {
    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weekly_grammar() {
        let s = parse_when("every Monday at 8:00", chrono_tz::UTC).unwrap();
        assert_eq!(s, Schedule::Weekly { day: 0, hour: 8, minute: 0 });
    }

    #[test]
    fn parses_daily_grammar() {
        let s = parse_when("every day at 20:00", chrono_tz::UTC).unwrap();
        assert_eq!(s, Schedule::Daily { hour: 20, minute: 0 });
    }

    #[test]
    fn parses_weekday_grammar() {
        let s = parse_when("every weekday at 9:00am", chrono_tz::UTC).unwrap();
        assert_eq!(s, Schedule::Weekday { hour: 9, minute: 0 });
    }

    #[test]
    fn falls_through_to_absolute_date() {
        let s = parse_when("2026-08-01 08:00", chrono_tz::UTC).unwrap();
        assert!(matches!(s, Schedule::Absolute { .. }));
    }

    #[test]
    fn matching_is_case_insensitive_after_trim() {
        let s = parse_when("  EVERY DAY AT 8:00  ", chrono_tz::UTC).unwrap();
        assert_eq!(s, Schedule::Daily { hour: 8, minute: 0 });
    }

    #[test]
    fn invalid_when_is_rejected() {
        assert!(parse_when("not a schedule at all??", chrono_tz::UTC).is_err());
    }
}
