//! Weekly status classifier and catch-up support.
//!
//! The history strip shows one cell per day of the current week. This
//! module classifies a single day against the schedule and the dose log,
//! lays out the Monday-first week, and builds the late entries a caller
//! persists when catching up a missed day.

use crate::schedule::{day_start, required_on};
use crate::{DayStatus, DoseLog, LogStatus, Medicine};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

/// The seven days of the Monday-first week containing `today`.
pub fn week_days(today: NaiveDate) -> [NaiveDate; 7] {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    std::array::from_fn(|i| monday + Duration::days(i as i64))
}

/// Classify one calendar day for the history strip.
///
/// Rules, in order:
/// 1. Nothing scheduled that weekday: `NoDoseRequired`.
/// 2. Every required medicine has a log dated that day: `Late` when any
///    of the required medicines' logs that day is late, else `Taken`.
///    Stray logs from medicines not required that day never flip the
///    cell to late.
/// 3. An elapsed day: `Missed`.
/// 4. Today or a future day: `Pending`.
///
/// `Missed` is the only status callers may catch up from.
pub fn classify_day<Tz: TimeZone>(
    day: NaiveDate,
    medicines: &[Medicine],
    logs: &[DoseLog],
    now: &DateTime<Tz>,
) -> DayStatus {
    let required = required_on(medicines, day);
    if required.is_empty() {
        return DayStatus::NoDoseRequired;
    }

    let tz = now.timezone();
    let day_logs: Vec<&DoseLog> = logs.iter().filter(|l| l.local_day(&tz) == day).collect();

    let covered = required
        .iter()
        .all(|m| day_logs.iter().any(|l| l.medicine_id == m.id));
    if covered {
        let any_late = day_logs.iter().any(|l| {
            l.status == LogStatus::Late && required.iter().any(|m| m.id == l.medicine_id)
        });
        return if any_late {
            DayStatus::Late
        } else {
            DayStatus::Taken
        };
    }

    if day < now.date_naive() {
        DayStatus::Missed
    } else {
        DayStatus::Pending
    }
}

/// Build the late entries that catch up a missed day.
///
/// One new log per medicine required on `day` that has none yet, each
/// with a fresh id, `Late` status, and `taken_at` anchored at local
/// midnight of `day`. Returns entries for the caller to persist; nothing
/// is written here. Medicines already logged that day are skipped, so
/// persisting the output and calling again yields nothing new.
pub fn bulk_mark_late<Tz: TimeZone>(
    day: NaiveDate,
    medicines: &[Medicine],
    logs: &[DoseLog],
    tz: &Tz,
) -> Vec<DoseLog> {
    let mut entries = Vec::new();

    for medicine in required_on(medicines, day) {
        let already = logs
            .iter()
            .any(|l| l.medicine_id == medicine.id && l.local_day(tz) == day);
        if already {
            continue;
        }

        let anchor = match day_start(day, tz) {
            Some(instant) => instant,
            None => {
                tracing::warn!("No valid instant on {} in this zone, skipping", day);
                continue;
            }
        };

        entries.push(DoseLog {
            id: Uuid::new_v4(),
            medicine_id: medicine.id,
            taken_at: anchor.with_timezone(&Utc),
            status: LogStatus::Late,
        });
    }

    tracing::debug!("Catch-up for {}: {} new entries", day, entries.len());
    entries
}
