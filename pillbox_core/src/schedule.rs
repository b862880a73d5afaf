//! Schedule validation and weekly-schedule helpers.
//!
//! Everything that touches a `Medicine`'s schedule fields lives here:
//! - Boundary validation (run before a medicine reaches the store or engine)
//! - `"HH:MM"` parsing
//! - Required-on-day filtering
//! - The overdue check used to decide whether a dose counts as late

use crate::{Error, Medicine, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike};

/// Weekday index for a calendar day, `0 = Sunday` through `6 = Saturday`.
pub fn weekday_index(day: NaiveDate) -> u8 {
    day.weekday().num_days_from_sunday() as u8
}

/// Parse a canonical `"HH:MM"` 24-hour time string.
pub fn parse_time(time: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| Error::InvalidSchedule(format!("time '{}' is not HH:MM", time)))
}

/// Validate a medicine before it is stored or fed to the engine.
///
/// Rejects an empty name, an unparsable time, an empty day set, and
/// duplicate or out-of-range day indices. Anything that passes here is
/// well formed as far as the engine and classifier are concerned.
pub fn validate_medicine(medicine: &Medicine) -> Result<()> {
    if medicine.name.trim().is_empty() {
        return Err(Error::InvalidSchedule("medicine name is empty".into()));
    }

    parse_time(&medicine.time)?;

    if medicine.days_of_week.is_empty() {
        return Err(Error::InvalidSchedule(format!(
            "'{}' has no scheduled days",
            medicine.name
        )));
    }

    let mut seen = [false; 7];
    for &day in &medicine.days_of_week {
        if day > 6 {
            return Err(Error::InvalidSchedule(format!(
                "'{}' has day index {} (valid range is 0-6, Sunday first)",
                medicine.name, day
            )));
        }
        if seen[day as usize] {
            return Err(Error::InvalidSchedule(format!(
                "'{}' lists day index {} twice",
                medicine.name, day
            )));
        }
        seen[day as usize] = true;
    }

    Ok(())
}

/// Medicines required on the given calendar day.
pub fn required_on(medicines: &[Medicine], day: NaiveDate) -> Vec<&Medicine> {
    let weekday = weekday_index(day);
    medicines
        .iter()
        .filter(|m| m.days_of_week.contains(&weekday))
        .collect()
}

/// Whether `now` is past the medicine's scheduled time today by more than
/// the grace period.
///
/// Compares wall-clock minutes within `now`'s own day, so the answer is
/// local to whatever zone the caller evaluates in. A medicine whose time
/// fails to parse is never overdue; validation should have caught it.
pub fn is_overdue<Tz: TimeZone>(
    medicine: &Medicine,
    now: &DateTime<Tz>,
    grace_minutes: u32,
) -> bool {
    let scheduled = match parse_time(&medicine.time) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let now_minutes = (now.hour() * 60 + now.minute()) as i64;
    let scheduled_minutes = (scheduled.hour() * 60 + scheduled.minute()) as i64;
    now_minutes - scheduled_minutes > grace_minutes as i64
}

/// Local midnight of a day, falling back to noon when a DST transition
/// skips midnight. The fallback never changes which day the instant
/// belongs to.
pub fn day_start<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
    let midnight = day.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(12)))
                .earliest()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn med(name: &str, time: &str, days: &[u8]) -> Medicine {
        Medicine {
            id: Uuid::new_v4(),
            name: name.into(),
            reason: None,
            time: time.into(),
            days_of_week: days.to_vec(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let m = med("Vitamin C", "08:00", &[1, 2, 3, 4, 5]);
        assert!(validate_medicine(&m).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_days() {
        let m = med("Vitamin C", "08:00", &[]);
        assert!(matches!(
            validate_medicine(&m),
            Err(Error::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_time() {
        let m = med("Vitamin C", "8am", &[0]);
        assert!(validate_medicine(&m).is_err());
        let m = med("Vitamin C", "25:00", &[0]);
        assert!(validate_medicine(&m).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_day() {
        let m = med("Vitamin C", "08:00", &[7]);
        assert!(validate_medicine(&m).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_day() {
        let m = med("Vitamin C", "08:00", &[2, 2]);
        assert!(validate_medicine(&m).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let m = med("   ", "08:00", &[0]);
        assert!(validate_medicine(&m).is_err());
    }

    #[test]
    fn test_required_on_filters_by_weekday() {
        // 2026-01-06 is a Tuesday (index 2), 2026-01-04 a Sunday (index 0)
        let sunday_only = med("Sunday med", "09:00", &[0]);
        let daily = med("Daily med", "09:00", &[0, 1, 2, 3, 4, 5, 6]);
        let meds = vec![sunday_only, daily];

        let tuesday = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let required = required_on(&meds, tuesday);
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].name, "Daily med");

        let sunday = NaiveDate::from_ymd_opt(2026, 1, 4).unwrap();
        assert_eq!(required_on(&meds, sunday).len(), 2);
    }

    #[test]
    fn test_weekday_index_sunday_is_zero() {
        let sunday = NaiveDate::from_ymd_opt(2026, 1, 4).unwrap();
        assert_eq!(weekday_index(sunday), 0);
        let saturday = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();
        assert_eq!(weekday_index(saturday), 6);
    }

    #[test]
    fn test_overdue_respects_grace() {
        let m = med("Vitamin C", "08:00", &[0, 1, 2, 3, 4, 5, 6]);

        let within_grace = Utc.with_ymd_and_hms(2026, 1, 6, 8, 45, 0).unwrap();
        assert!(!is_overdue(&m, &within_grace, 60));

        let past_grace = Utc.with_ymd_and_hms(2026, 1, 6, 9, 1, 0).unwrap();
        assert!(is_overdue(&m, &past_grace, 60));

        let before = Utc.with_ymd_and_hms(2026, 1, 6, 7, 0, 0).unwrap();
        assert!(!is_overdue(&m, &before, 60));
    }

    #[test]
    fn test_day_start_is_midnight_utc() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let start = day_start(day, &Utc).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 6, 0, 0, 0).unwrap());
    }
}
