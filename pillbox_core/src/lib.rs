#![forbid(unsafe_code)]

//! Core domain model and business logic for the Pillbox medication tracker.
//!
//! This crate provides:
//! - Domain types (medicines, dose logs, mascot status)
//! - Schedule validation and the adherence engine
//! - Weekly history classification and catch-up
//! - Persistence (medicine store, dose journal, CSV export)
//! - Configuration

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod schedule;
pub mod engine;
pub mod week;
pub mod store;
pub mod journal;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use engine::{compute_adherence, detect_clock_skew};
pub use journal::{JournalSink, JsonlJournal};
pub use schedule::validate_medicine;
pub use store::MedicineBook;
pub use week::{bulk_mark_late, classify_day, week_days};
