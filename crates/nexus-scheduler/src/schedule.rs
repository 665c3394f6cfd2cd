use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;

/// Covers the three free-text grammars (weekly/daily/weekday cron-style
/// triggers) plus an absolute one-shot date. See SPEC_FULL.md §4.8 / §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// `every <weekday> at <time>`. `day` is ISO weekday: 0=Monday..6=Sunday.
    Weekly { day: u8, hour: u8, minute: u8 },
    /// `every day at <time>`.
    Daily { hour: u8, minute: u8 },
    /// `every weekday at <time>` (Mon-Fri).
    Weekday { hour: u8, minute: u8 },
    /// Any other string parsed as an absolute date/time.
    Absolute { at: DateTime<Utc> },
}

impl Schedule {
    /// `"cron"` for the three recurring grammars, `"date"` for absolute —
    /// mirrors the `kind` column the reference scheduler persists.
    pub fn kind(&self) -> &'static str {
        match self {
            Schedule::Absolute { .. } => "date",
            _ => "cron",
        }
    }
}

/// Compute the next UTC execution time for `schedule` strictly after `from`.
/// `tz` localizes naive daily/weekly/weekday times; `Absolute` instants are
/// already UTC-normalized by the parser.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Absolute { at } => {
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }
        Schedule::Daily { hour, minute } => next_daily(from, tz, *hour, *minute),
        Schedule::Weekday { hour, minute } => next_weekday(from, tz, *hour, *minute),
        Schedule::Weekly { day, hour, minute } => next_weekly(from, tz, *day, *hour, *minute),
    }
}

fn next_daily(from: DateTime<Utc>, tz: Tz, hour: u8, minute: u8) -> Option<DateTime<Utc>> {
    let local = from.with_timezone(&tz);
    let candidate = tz
        .with_ymd_and_hms(
            local.year(),
            local.month(),
            local.day(),
            hour as u32,
            minute as u32,
            0,
        )
        .single()?
        .with_timezone(&Utc);
    if candidate > from {
        Some(candidate)
    } else {
        Some(candidate + Duration::days(1))
    }
}

fn next_weekday(from: DateTime<Utc>, tz: Tz, hour: u8, minute: u8) -> Option<DateTime<Utc>> {
    let mut candidate = next_daily(from, tz, hour, minute)?;
    loop {
        let local = candidate.with_timezone(&tz);
        let is_weekend = matches!(
            local.weekday(),
            chrono::Weekday::Sat | chrono::Weekday::Sun
        );
        if !is_weekend {
            return Some(candidate);
        }
        candidate += Duration::days(1);
    }
}

fn next_weekly(from: DateTime<Utc>, tz: Tz, day: u8, hour: u8, minute: u8) -> Option<DateTime<Utc>> {
    let local = from.with_timezone(&tz);
    let today_dow = local.weekday().num_days_from_monday() as i64;
    let target_dow = (day as i64).clamp(0, 6);
    let mut days_ahead = target_dow - today_dow;
    if days_ahead < 0 {
        days_ahead += 7;
    }

    let candidate_day = local + Duration::days(days_ahead);
    let candidate = tz
        .with_ymd_and_hms(
            candidate_day.year(),
            candidate_day.month(),
            candidate_day.day(),
            hour as u32,
            minute as u32,
            0,
        )
        .single()?
        .with_timezone(&Utc);

    if candidate > from {
        Some(candidate)
    } else {
        Some(candidate + Duration::days(7))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn daily_advances_to_tomorrow_once_passed() {
        let tz = chrono_tz::UTC;
        let from = Utc.with_ymd_and_hms(2026, 7, 29, 10, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Daily { hour: 8, minute: 0 }, from, tz).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 30, 8, 0, 0).unwrap());
    }

    #[test]
    fn daily_same_day_if_still_ahead() {
        let tz = chrono_tz::UTC;
        let from = Utc.with_ymd_and_hms(2026, 7, 29, 6, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Daily { hour: 8, minute: 0 }, from, tz).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 29, 8, 0, 0).unwrap());
    }

    #[test]
    fn weekday_skips_weekend() {
        let tz = chrono_tz::UTC;
        // 2026-07-31 is a Friday; asking for 8:00 after it has passed on
        // Friday should land on Monday 2026-08-03.
        let from = Utc.with_ymd_and_hms(2026, 7, 31, 10, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Weekday { hour: 8, minute: 0 }, from, tz).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 3, 8, 0, 0).unwrap());
    }

    #[test]
    fn weekly_lands_on_target_weekday() {
        let tz = chrono_tz::UTC;
        // 2026-07-29 is a Wednesday; "every monday" should land on 2026-08-03.
        let from = Utc.with_ymd_and_hms(2026, 7, 29, 10, 0, 0).unwrap();
        let next = compute_next_run(&Schedule::Weekly { day: 0, hour: 8, minute: 0 }, from, tz).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 3, 8, 0, 0).unwrap());
    }

    #[test]
    fn absolute_none_once_past() {
        let tz = chrono_tz::UTC;
        let from = Utc.with_ymd_and_hms(2026, 7, 29, 10, 0, 0).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 7, 29, 9, 0, 0).unwrap();
        assert!(compute_next_run(&Schedule::Absolute { at }, from, tz).is_none());
    }
}
