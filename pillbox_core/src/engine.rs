//! Adherence engine: mascot status and streak.
//!
//! This module implements the adherence rules:
//! - Walk back from today counting fully-satisfied required days (streak)
//! - Walk back from yesterday counting fully-missed required days (death)
//! - Pick the mascot tier from the two walks and the configured thresholds
//!
//! Everything here is pure: callers pass snapshots of the medicine list
//! and the dose log plus the clock reading, and thresholds arrive as
//! configuration. Dose timestamps are bucketed into calendar days in the
//! zone of the supplied `now`.

use crate::config::MascotConfig;
use crate::schedule::required_on;
use crate::{Adherence, ClockSkew, DoseLog, MascotStatus, Medicine};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Compute the current adherence standing.
///
/// ## Rules
///
/// 1. **No medicines**: neutral tier, streak 0.
///
/// 2. **Streak**: consecutive required days, ending at today, on which
///    every required medicine has a log (late logs count). Today joins
///    the streak only once fully logged; until then it is pending and
///    neither counts nor breaks. Days with nothing required are skipped.
///
/// 3. **Death**: `dead_after_missed_days` consecutive elapsed required
///    days with no log at all among the required medicines. Any dose
///    logged today revives the mascot immediately.
///
/// 4. **Tier**: dead, else thriving once the streak reaches
///    `thriving_streak`, else healthy while a streak is alive, else
///    worried after a missed required day. A user whose schedule has no
///    elapsed required days yet is healthy.
///
/// Both walks stop at the earliest medicine `created_at`, so the engine
/// never scans into time before the user had a schedule.
pub fn compute_adherence<Tz: TimeZone>(
    medicines: &[Medicine],
    logs: &[DoseLog],
    now: &DateTime<Tz>,
    mascot: &MascotConfig,
) -> Adherence {
    if medicines.is_empty() {
        return Adherence {
            status: MascotStatus::Healthy,
            streak: 0,
        };
    }

    let tz = now.timezone();
    let today = now.date_naive();
    let floor = earliest_created(medicines, &tz, today);

    let (streak, broke_on_missed) = streak_walk(medicines, logs, today, floor, &tz);
    let missed_run = missed_walk(
        medicines,
        logs,
        today,
        floor,
        &tz,
        mascot.dead_after_missed_days,
    );

    let status = if missed_run >= mascot.dead_after_missed_days {
        MascotStatus::Dead
    } else if streak >= mascot.thriving_streak {
        MascotStatus::Thriving
    } else if streak > 0 {
        MascotStatus::Healthy
    } else if broke_on_missed {
        MascotStatus::Worried
    } else {
        MascotStatus::Healthy
    };

    tracing::debug!(
        "Adherence: status={}, streak={}, missed_run={}",
        status,
        streak,
        missed_run
    );

    Adherence { status, streak }
}

/// Warn-level check for logs that postdate the caller's clock.
///
/// Returns the newest offending timestamp so callers can surface it.
/// The engine itself keeps computing from the data as given.
pub fn detect_clock_skew<Tz: TimeZone>(
    logs: &[DoseLog],
    now: &DateTime<Tz>,
) -> Option<ClockSkew> {
    let latest = logs.iter().map(|l| l.taken_at).max()?;
    if latest > now.with_timezone(&Utc) {
        Some(ClockSkew {
            latest_taken_at: latest,
        })
    } else {
        None
    }
}

/// Earliest calendar day any medicine existed on, in the caller's zone.
fn earliest_created<Tz: TimeZone>(medicines: &[Medicine], tz: &Tz, today: NaiveDate) -> NaiveDate {
    medicines
        .iter()
        .map(|m| m.created_at.with_timezone(tz).date_naive())
        .min()
        .unwrap_or(today)
}

fn has_log_on<Tz: TimeZone>(logs: &[DoseLog], medicine: &Medicine, day: NaiveDate, tz: &Tz) -> bool {
    logs.iter()
        .any(|l| l.medicine_id == medicine.id && l.local_day(tz) == day)
}

/// Walk back from today counting consecutive satisfied required days.
///
/// Returns the streak and whether the walk ended on a missed elapsed day
/// (as opposed to running out of schedule history).
fn streak_walk<Tz: TimeZone>(
    medicines: &[Medicine],
    logs: &[DoseLog],
    today: NaiveDate,
    floor: NaiveDate,
    tz: &Tz,
) -> (u32, bool) {
    let mut streak = 0u32;
    let mut day = today;

    loop {
        if day < floor {
            return (streak, false);
        }

        let required = required_on(medicines, day);
        if !required.is_empty() {
            let satisfied = required.iter().all(|m| has_log_on(logs, m, day, tz));
            if satisfied {
                streak += 1;
            } else if day != today {
                return (streak, true);
            }
            // An unfinished today stays pending: skipped, not a break.
        }

        day = match day.pred_opt() {
            Some(prev) => prev,
            None => return (streak, false),
        };
    }
}

/// Walk back from yesterday counting consecutive fully-missed required
/// days, capped at `cap`. Any dose logged today resets the count.
fn missed_walk<Tz: TimeZone>(
    medicines: &[Medicine],
    logs: &[DoseLog],
    today: NaiveDate,
    floor: NaiveDate,
    tz: &Tz,
    cap: u32,
) -> u32 {
    if logs.iter().any(|l| l.local_day(tz) == today) {
        return 0;
    }

    let mut run = 0u32;
    let mut day = match today.pred_opt() {
        Some(prev) => prev,
        None => return 0,
    };

    loop {
        if day < floor || run >= cap {
            return run;
        }

        let required = required_on(medicines, day);
        if !required.is_empty() {
            let any_logged = required.iter().any(|m| has_log_on(logs, m, day, tz));
            if any_logged {
                return run;
            }
            run += 1;
        }

        day = match day.pred_opt() {
            Some(prev) => prev,
            None => return run,
        };
    }
}
