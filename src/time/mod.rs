//! Shop-local calendar arithmetic

mod recurrence;
mod week_copy;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub use recurrence::{generate_recurring_instances, EndType, Frequency, RecurrenceLimits, RecurrencePattern};
pub use week_copy::{match_inserted_copies, plan_week_copy, InsertedCopy, PlannedCopy};

/// Resolve a shop-local wall-clock time to an instant.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times inside
/// a spring-forward gap move forward by one hour.
pub fn localize(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return dt.with_timezone(&Utc);
    }
    let shifted = local + Duration::hours(1);
    match tz.from_local_datetime(&shifted).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&local),
    }
}

/// Calendar date of an instant in the shop's timezone
pub fn local_date(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Wall-clock time of an instant in the shop's timezone
pub fn local_time(instant: DateTime<Utc>, tz: &Tz) -> NaiveTime {
    instant.with_timezone(tz).time()
}

/// Weekday index with Sunday as 0
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// The Sunday starting the week that contains `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(weekday_index(date)))
}

/// Start of a shop-local day as an instant
pub fn start_of_local_day(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    localize(tz, date.and_time(NaiveTime::MIN))
}

/// `[start, end)` instants of the Sunday-start local week containing `date`
pub fn local_week_bounds(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = week_start(date);
    (
        start_of_local_day(start, tz),
        start_of_local_day(start + Duration::days(7), tz),
    )
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}
