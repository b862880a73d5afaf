//! CSV export of the dose history.
//!
//! Joins the journal against the medicine list and writes one row per
//! dose, atomically (temp file, sync, rename), so a half-finished export
//! never clobbers a previous one.

use crate::store::MedicineBook;
use crate::{DoseLog, Error, Result};
use chrono::TimeZone;
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct HistoryRow {
    id: String,
    medicine_id: String,
    medicine: String,
    taken_at: String,
    status: String,
    day: String,
}

impl HistoryRow {
    fn build<Tz: TimeZone>(log: &DoseLog, book: &MedicineBook, tz: &Tz) -> Self {
        let medicine = book
            .get(log.medicine_id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "(unknown)".into());
        HistoryRow {
            id: log.id.to_string(),
            medicine_id: log.medicine_id.to_string(),
            medicine,
            taken_at: log.taken_at.to_rfc3339(),
            status: log.status.to_string(),
            day: log.local_day(tz).to_string(),
        }
    }
}

/// Write the full dose history as CSV
///
/// Rows are ordered oldest first. Logs whose medicine has vanished (a
/// crash between the deletion save and the journal purge) still export,
/// with `(unknown)` in the medicine column. Returns the row count.
pub fn write_history_csv<Tz: TimeZone>(
    path: &Path,
    book: &MedicineBook,
    logs: &[DoseLog],
    tz: &Tz,
) -> Result<usize> {
    if logs.is_empty() {
        tracing::info!("No doses to export");
        return Ok(0);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "export path missing parent")
    })?;
    let temp = NamedTempFile::new_in(parent)?;

    let mut ordered: Vec<&DoseLog> = logs.iter().collect();
    ordered.sort_by_key(|l| l.taken_at);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(temp.as_file());

    let mut unknown = 0usize;
    for log in &ordered {
        if book.get(log.medicine_id).is_none() {
            unknown += 1;
        }
        writer.serialize(HistoryRow::build(log, book, tz))?;
    }
    writer.flush()?;
    drop(writer);

    if unknown > 0 {
        tracing::warn!("{} exported doses reference a deleted medicine", unknown);
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} doses to {:?}", ordered.len(), path);
    Ok(ordered.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogStatus, Medicine};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn med(name: &str) -> Medicine {
        Medicine {
            id: Uuid::new_v4(),
            name: name.into(),
            reason: None,
            time: "08:00".into(),
            days_of_week: vec![0, 1, 2, 3, 4, 5, 6],
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    fn log_at(medicine_id: Uuid, taken_at: chrono::DateTime<Utc>, status: LogStatus) -> DoseLog {
        DoseLog {
            id: Uuid::new_v4(),
            medicine_id,
            taken_at,
            status,
        }
    }

    #[test]
    fn test_export_writes_joined_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("history.csv");

        let vitc = med("Vitamin C");
        let later = Utc.with_ymd_and_hms(2026, 1, 6, 11, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let logs = vec![
            log_at(vitc.id, later, LogStatus::Late),
            log_at(vitc.id, earlier, LogStatus::Taken),
        ];
        let book = MedicineBook {
            medicines: vec![vitc],
        };

        let count = write_history_csv(&csv_path, &book, &logs, &Utc).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,medicine_id,medicine,taken_at,status,day"
        );
        // Oldest first
        let first = lines.next().unwrap();
        assert!(first.contains("Vitamin C"));
        assert!(first.contains("taken"));
        assert!(first.contains("2026-01-05"));
        let second = lines.next().unwrap();
        assert!(second.contains("late"));
        assert!(second.contains("2026-01-06"));
    }

    #[test]
    fn test_export_keeps_orphaned_logs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("history.csv");

        let taken_at = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let logs = vec![log_at(Uuid::new_v4(), taken_at, LogStatus::Taken)];
        let book = MedicineBook::default();

        let count = write_history_csv(&csv_path, &book, &logs, &Utc).unwrap();
        assert_eq!(count, 1);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        assert!(contents.contains("(unknown)"));
    }

    #[test]
    fn test_export_empty_history_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("history.csv");

        let count = write_history_csv(&csv_path, &MedicineBook::default(), &[], &Utc).unwrap();
        assert_eq!(count, 0);
        assert!(!csv_path.exists());
    }
}
