//! Weekly and biweekly recurring shifts

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewShift, Shift};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
}

impl Frequency {
    fn week_step(&self) -> i64 {
        match self {
            Frequency::Weekly => 1,
            Frequency::Biweekly => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndType {
    Never,
    OnDate,
}

/// How a newly created shift repeats. Consumed once, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    /// Weekday indices, 0 = Sunday
    pub days: Vec<u32>,
    pub end_type: EndType,
    /// Last date that may carry an instance, compared in UTC
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl RecurrencePattern {
    pub fn weekly(days: &[u32]) -> Self {
        Self {
            frequency: Frequency::Weekly,
            days: days.to_vec(),
            end_type: EndType::Never,
            end_date: None,
        }
    }

    pub fn biweekly(days: &[u32]) -> Self {
        Self {
            frequency: Frequency::Biweekly,
            ..Self::weekly(days)
        }
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_type = EndType::OnDate;
        self.end_date = Some(end_date);
        self
    }

    /// Reject weekday indices above 6 and an `on_date` end without a date
    pub fn validate(&self) -> Result<()> {
        if let Some(day) = self.days.iter().find(|d| **d > 6) {
            return Err(Error::validation(format!("Invalid weekday: {}", day)));
        }
        if self.end_type == EndType::OnDate && self.end_date.is_none() {
            return Err(Error::validation(
                "An end date is required when the recurrence ends on a date",
            ));
        }
        Ok(())
    }
}

/// Fan-out bounds for one pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceLimits {
    /// Shared across every weekday of the pattern
    pub max_instances: usize,
    /// Horizon when the pattern never ends
    pub horizon_weeks: i64,
}

impl Default for RecurrenceLimits {
    fn default() -> Self {
        Self {
            max_instances: 104,
            horizon_weeks: 104,
        }
    }
}

/// Draft shifts repeating `base` per `pattern`.
///
/// Every instance falls strictly after the anchor's day, keeps the anchor's
/// duration and recurrence group, and is a draft. Weekdays are visited in
/// ascending order and share one instance counter, so a long pattern over many
/// weekdays can leave the later weekdays short.
pub fn generate_recurring_instances(
    base: &Shift,
    pattern: &RecurrencePattern,
    created_by: Uuid,
    limits: &RecurrenceLimits,
) -> Result<Vec<NewShift>> {
    pattern.validate()?;

    let within: Box<dyn Fn(DateTime<Utc>) -> bool> = match (pattern.end_type, pattern.end_date) {
        (EndType::OnDate, Some(end_date)) => {
            Box::new(move |start: DateTime<Utc>| start.date_naive() <= end_date)
        }
        _ => {
            let max = base.start_time + Duration::weeks(limits.horizon_weeks);
            Box::new(move |start: DateTime<Utc>| start <= max)
        }
    };

    let duration = base.duration();
    let step = Duration::weeks(pattern.frequency.week_step());
    let anchor_weekday = base.start_time.weekday().num_days_from_sunday() as i64;
    let days: BTreeSet<u32> = pattern.days.iter().copied().collect();

    let mut instances = Vec::new();
    for target_day in days {
        let mut offset = i64::from(target_day) - anchor_weekday;
        if offset <= 0 {
            offset += 7;
        }

        let mut start = base.start_time + Duration::days(offset);
        while within(start) && instances.len() < limits.max_instances {
            let mut instance = NewShift::draft_copy_of(base, created_by);
            instance.start_time = start;
            instance.end_time = start + duration;
            instances.push(instance);
            start += step;
        }
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShiftStatus;
    use chrono::TimeZone;

    fn anchor() -> Shift {
        // Wednesday
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 14, 0, 0).unwrap();
        Shift {
            id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            schedule_id: None,
            user_id: Some(Uuid::new_v4()),
            position_id: None,
            start_time: start,
            end_time: start + Duration::hours(8) + Duration::minutes(30),
            break_minutes: 30,
            status: ShiftStatus::Published,
            is_open: false,
            notes: Some("bring keys".to_string()),
            color: None,
            recurrence_group_id: Some(Uuid::new_v4()),
            created_by: None,
        }
    }

    #[test]
    fn never_ending_pattern_is_capped_and_strictly_after_anchor() {
        let base = anchor();
        let pattern = RecurrencePattern::weekly(&[0, 1, 2, 3, 4, 5, 6]);
        let instances =
            generate_recurring_instances(&base, &pattern, Uuid::new_v4(), &RecurrenceLimits::default())
                .unwrap();

        assert_eq!(instances.len(), 104);
        assert!(instances
            .iter()
            .all(|i| i.start_time.date_naive() > base.start_time.date_naive()));
        assert!(instances.iter().all(|i| i.duration_is(base.duration())));
        assert!(instances.iter().all(|i| i.status == ShiftStatus::Draft));
        assert!(instances
            .iter()
            .all(|i| i.recurrence_group_id == base.recurrence_group_id));
    }

    #[test]
    fn anchor_weekday_starts_next_week() {
        let base = anchor();
        let pattern = RecurrencePattern::weekly(&[3]).until(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        let instances =
            generate_recurring_instances(&base, &pattern, Uuid::new_v4(), &RecurrenceLimits::default())
                .unwrap();

        let dates: Vec<_> = instances.iter().map(|i| i.start_time.date_naive()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 17).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 24).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            ]
        );
    }

    #[test]
    fn biweekly_steps_two_weeks() {
        let base = anchor();
        let pattern =
            RecurrencePattern::biweekly(&[5]).until(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let instances =
            generate_recurring_instances(&base, &pattern, Uuid::new_v4(), &RecurrenceLimits::default())
                .unwrap();

        let dates: Vec<_> = instances.iter().map(|i| i.start_time.date_naive()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 26).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 9).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 23).unwrap(),
            ]
        );
    }

    #[test]
    fn shared_cap_starves_later_weekdays() {
        let base = anchor();
        let limits = RecurrenceLimits {
            max_instances: 5,
            horizon_weeks: 104,
        };
        let instances =
            generate_recurring_instances(&base, &RecurrencePattern::weekly(&[4, 1]), Uuid::new_v4(), &limits)
                .unwrap();

        assert_eq!(instances.len(), 5);
        // Monday (1) is visited before Thursday (4) and takes the whole budget
        assert!(instances
            .iter()
            .all(|i| i.start_time.weekday().num_days_from_sunday() == 1));
    }

    #[test]
    fn duplicate_days_count_once() {
        let base = anchor();
        let pattern =
            RecurrencePattern::weekly(&[6, 6, 6]).until(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        let instances =
            generate_recurring_instances(&base, &pattern, Uuid::new_v4(), &RecurrenceLimits::default())
                .unwrap();
        assert_eq!(instances.len(), 2);
    }

    #[test]
    fn end_date_is_inclusive_on_the_utc_date() {
        // Monday 20:00 in Chicago is Tuesday 02:00 UTC
        let start = chrono_tz::America::Chicago
            .with_ymd_and_hms(2024, 1, 8, 20, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let base = Shift {
            start_time: start,
            end_time: start + Duration::hours(6),
            ..anchor()
        };
        let tuesdays = |end: NaiveDate| -> Vec<DateTime<Utc>> {
            let pattern = RecurrencePattern::weekly(&[2]).until(end);
            generate_recurring_instances(&base, &pattern, Uuid::new_v4(), &RecurrenceLimits::default())
                .unwrap()
                .iter()
                .map(|i| i.start_time)
                .collect()
        };

        let through_23rd = tuesdays(NaiveDate::from_ymd_opt(2024, 1, 23).unwrap());
        assert_eq!(
            through_23rd,
            vec![
                Utc.with_ymd_and_hms(2024, 1, 16, 2, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 23, 2, 0, 0).unwrap(),
            ]
        );

        // The second instance is still the 22nd in Chicago but the 23rd in UTC
        let through_22nd = tuesdays(NaiveDate::from_ymd_opt(2024, 1, 22).unwrap());
        assert_eq!(
            through_22nd,
            vec![Utc.with_ymd_and_hms(2024, 1, 16, 2, 0, 0).unwrap()]
        );
    }

    #[test]
    fn on_date_without_date_is_rejected() {
        let base = anchor();
        let mut pattern = RecurrencePattern::weekly(&[1]);
        pattern.end_type = EndType::OnDate;
        let err =
            generate_recurring_instances(&base, &pattern, Uuid::new_v4(), &RecurrenceLimits::default())
                .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn wire_format_is_camel_case() {
        let pattern: RecurrencePattern = serde_json::from_value(serde_json::json!({
            "frequency": "biweekly",
            "days": [1, 3],
            "endType": "on_date",
            "endDate": "2024-06-30"
        }))
        .unwrap();
        assert_eq!(pattern.frequency, Frequency::Biweekly);
        assert_eq!(pattern.end_date, NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    trait DurationIs {
        fn duration_is(&self, expected: Duration) -> bool;
    }

    impl DurationIs for NewShift {
        fn duration_is(&self, expected: Duration) -> bool {
            self.end_time - self.start_time == expected
        }
    }
}
