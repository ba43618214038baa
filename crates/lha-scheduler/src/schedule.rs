use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Timelike, Utc, Weekday,
};

use lha_core::config::ScheduleTimezone;

use crate::types::Cadence;

/// Calendar days tried before giving up.
const MAX_LOOKAHEAD: usize = 8;

/// Absolute minutes walked looking for the next sub-day slot. Covers an
/// hour plus the widest offset jump.
const MAX_WALL_MINUTES: i64 = 3 * 60;

/// Widest spring-forward gap searched when a day has no midnight.
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// Compute the next instant strictly after `from` at which `cadence` fires,
/// aligned to the wall clock of `from`'s time zone.
///
/// Sub-day cadences walk absolute time, so a local hour repeated by a
/// fall-back transition fires twice and one skipped by spring-forward not
/// at all. Calendar cadences fire at the first instant of the day, which is
/// the end of the gap when midnight itself does not exist.
pub fn next_fire<Tz: TimeZone>(cadence: Cadence, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    match cadence {
        Cadence::TenMinutes => next_wall_minute(from, 10),
        Cadence::Hourly => next_wall_minute(from, 60),
        Cadence::Daily | Cadence::Weekend | Cadence::Monthly => next_calendar_fire(cadence, from),
    }
}

/// [`next_fire`] on a UTC instant, aligned to the configured clock.
pub fn next_fire_utc(
    zone: ScheduleTimezone,
    cadence: Cadence,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match zone {
        ScheduleTimezone::Utc => next_fire(cadence, &from),
        ScheduleTimezone::Local => {
            next_fire(cadence, &from.with_timezone(&Local)).map(|t| t.with_timezone(&Utc))
        }
    }
}

/// First whole minute after `from` whose local minute is a multiple of `every`.
fn next_wall_minute<Tz: TimeZone>(from: &DateTime<Tz>, every: u32) -> Option<DateTime<Tz>> {
    let into_minute =
        Duration::seconds(i64::from(from.second())) + Duration::nanoseconds(i64::from(from.nanosecond()));
    let mut candidate = from.clone() - into_minute;

    for _ in 0..MAX_WALL_MINUTES {
        candidate = candidate + Duration::minutes(1);
        if candidate.second() == 0 && candidate.minute() % every == 0 {
            return Some(candidate);
        }
    }
    None
}

fn next_calendar_fire<Tz: TimeZone>(cadence: Cadence, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = from.timezone();
    let mut day = from.naive_local().date();

    for _ in 0..MAX_LOOKAHEAD {
        day = next_fire_day(cadence, day)?;
        if let Some(start) = start_of_day(&tz, day) {
            if start > *from {
                return Some(start);
            }
        }
    }
    None
}

/// Next calendar day after `after` on which `cadence` fires.
fn next_fire_day(cadence: Cadence, after: NaiveDate) -> Option<NaiveDate> {
    match cadence {
        Cadence::Daily => after.succ_opt(),

        Cadence::Weekend => {
            let mut day = after.succ_opt()?;
            while !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                day = day.succ_opt()?;
            }
            Some(day)
        }

        Cadence::Monthly => {
            let (year, month) = if after.month() == 12 {
                (after.year() + 1, 1)
            } else {
                (after.year(), after.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
        }

        Cadence::TenMinutes | Cadence::Hourly => None,
    }
}

/// Earliest instant of `day` in `tz`.
fn start_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Tz>> {
    let midnight = day.and_hms_opt(0, 0, 0)?;
    (0..MAX_GAP_MINUTES)
        .find_map(|m| tz.from_local_datetime(&(midnight + Duration::minutes(m))).earliest())
}
