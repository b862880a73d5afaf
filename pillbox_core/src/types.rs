//! Core domain types for the Pillbox medication tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medicines and their weekly schedules
//! - Dose logs (the append-only record of what was taken, and when)
//! - Derived adherence values (mascot status, streak, day classification)
//! - Soft diagnostics such as clock skew

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Schedule Types
// ============================================================================

/// A medicine the user takes on a weekly schedule.
///
/// `time` is canonical `"HH:MM"` 24-hour wall clock. `days_of_week` holds
/// weekday indices with `0 = Sunday` through `6 = Saturday` and is never
/// empty once a medicine has passed boundary validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub reason: Option<String>,
    pub time: String,
    pub days_of_week: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Dose Log Types
// ============================================================================

/// Whether a dose was recorded on time or past the grace period.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Taken,
    Late,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            LogStatus::Taken => "taken",
            LogStatus::Late => "late",
        };
        write!(f, "{}", word)
    }
}

/// A recorded dose. Immutable once written; removed only when the parent
/// medicine is deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoseLog {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub status: LogStatus,
}

impl DoseLog {
    /// Calendar day this dose belongs to, in the given zone.
    ///
    /// All day bucketing in the engine and classifier goes through this
    /// so a dose taken at 23:30 local never drifts into the next day.
    pub fn local_day<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.taken_at.with_timezone(tz).date_naive()
    }
}

// ============================================================================
// Derived Adherence Types
// ============================================================================

/// Mascot health tier, best to worst. Derived, never stored.
///
/// `Healthy` is the neutral tier (also used when no medicines exist yet).
/// `Dead` is recoverable: taking any medicine today revives the mascot.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MascotStatus {
    Thriving,
    Healthy,
    Worried,
    Dead,
}

impl fmt::Display for MascotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            MascotStatus::Thriving => "thriving",
            MascotStatus::Healthy => "healthy",
            MascotStatus::Worried => "worried",
            MascotStatus::Dead => "dead",
        };
        write!(f, "{}", word)
    }
}

/// Current adherence standing: mascot tier plus the running streak of
/// fully satisfied required days.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Adherence {
    pub status: MascotStatus,
    pub streak: u32,
}

/// Classification of one calendar day in the weekly history strip.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    /// No medicine is scheduled on this weekday.
    NoDoseRequired,
    /// Every required medicine was logged, all of them on time.
    Taken,
    /// Every required medicine was logged, at least one of them late.
    Late,
    /// The day has elapsed with at least one required medicine unlogged.
    Missed,
    /// Today or a future day that is not yet fully logged.
    Pending,
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            DayStatus::NoDoseRequired => "no doses",
            DayStatus::Taken => "taken",
            DayStatus::Late => "late",
            DayStatus::Missed => "missed",
            DayStatus::Pending => "pending",
        };
        write!(f, "{}", word)
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Soft warning raised when the newest log postdates the caller's clock.
/// Never fatal; adherence is still computed from the data as given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSkew {
    pub latest_taken_at: DateTime<Utc>,
}
