//! Append-only dose journal.
//!
//! Doses are appended to a JSONL (JSON Lines) file with file locking to
//! ensure safe concurrent access. The journal is the system of record
//! for everything the user has taken; entries are never edited, and the
//! only removal path is the cascade purge that runs when a medicine is
//! deleted.

use crate::{DoseLog, Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Dose sink trait for persisting logs
pub trait JournalSink {
    fn append(&mut self, log: &DoseLog) -> Result<()>;
}

/// JSONL-based dose journal with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a new JSONL journal for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl JournalSink for JsonlJournal {
    fn append(&mut self, log: &DoseLog) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        // Write log as JSON line
        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(log)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended dose {} to journal", log.id);
        Ok(())
    }
}

/// Read all dose logs from a journal file
///
/// Missing file reads as empty. Unparseable lines are warned about and
/// skipped so one bad line never hides the rest of the history.
pub fn read_logs(path: &Path) -> Result<Vec<DoseLog>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut logs = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseLog>(&line) {
            Ok(log) => logs.push(log),
            Err(e) => {
                tracing::warn!("Failed to parse dose at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} doses from journal", logs.len());
    Ok(logs)
}

/// Remove every entry belonging to one medicine, atomically.
///
/// Rewrites the journal without the medicine's entries via a temp file
/// in the same directory, then renames over the original. Returns how
/// many entries were purged. Used only by the medicine-deletion cascade.
pub fn purge_medicine(path: &Path, medicine_id: Uuid) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let logs = read_logs(path)?;
    let kept: Vec<&DoseLog> = logs.iter().filter(|l| l.medicine_id != medicine_id).collect();
    let purged = logs.len() - kept.len();

    if purged == 0 {
        return Ok(0);
    }

    let parent = path.parent().ok_or_else(|| {
        Error::Store(format!("journal path {:?} has no parent directory", path))
    })?;
    let temp = NamedTempFile::new_in(parent)?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        for log in &kept {
            let line = serde_json::to_string(log)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Purged {} doses for medicine {}", purged, medicine_id);
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogStatus;
    use chrono::Utc;

    fn create_test_log(medicine_id: Uuid) -> DoseLog {
        DoseLog {
            id: Uuid::new_v4(),
            medicine_id,
            taken_at: Utc::now(),
            status: LogStatus::Taken,
        }
    }

    #[test]
    fn test_append_and_read_single_dose() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("doses.jsonl");

        let log = create_test_log(Uuid::new_v4());
        let log_id = log.id;

        let mut journal = JsonlJournal::new(&journal_path);
        journal.append(&log).unwrap();

        let logs = read_logs(&journal_path).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].id, log_id);
    }

    #[test]
    fn test_append_multiple_doses() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("doses.jsonl");

        let mut journal = JsonlJournal::new(&journal_path);
        for _ in 0..5 {
            journal.append(&create_test_log(Uuid::new_v4())).unwrap();
        }

        let logs = read_logs(&journal_path).unwrap();
        assert_eq!(logs.len(), 5);
    }

    #[test]
    fn test_read_missing_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("nonexistent.jsonl");

        let logs = read_logs(&journal_path).unwrap();
        assert!(logs.is_empty());
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("doses.jsonl");

        let mut journal = JsonlJournal::new(&journal_path);
        journal.append(&create_test_log(Uuid::new_v4())).unwrap();

        // Corrupt the middle of the file, then append another good line.
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(&journal_path)
                .unwrap();
            writeln!(file, "{{ not json").unwrap();
        }
        journal.append(&create_test_log(Uuid::new_v4())).unwrap();

        let logs = read_logs(&journal_path).unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn test_purge_removes_only_target_medicine() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("doses.jsonl");

        let target = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut journal = JsonlJournal::new(&journal_path);
        journal.append(&create_test_log(target)).unwrap();
        journal.append(&create_test_log(other)).unwrap();
        journal.append(&create_test_log(target)).unwrap();

        let purged = purge_medicine(&journal_path, target).unwrap();
        assert_eq!(purged, 2);

        let logs = read_logs(&journal_path).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].medicine_id, other);
    }

    #[test]
    fn test_purge_missing_journal_is_zero() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("nonexistent.jsonl");

        assert_eq!(purge_medicine(&journal_path, Uuid::new_v4()).unwrap(), 0);
    }

    #[test]
    fn test_purge_without_matches_leaves_file_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("doses.jsonl");

        let mut journal = JsonlJournal::new(&journal_path);
        journal.append(&create_test_log(Uuid::new_v4())).unwrap();

        let purged = purge_medicine(&journal_path, Uuid::new_v4()).unwrap();
        assert_eq!(purged, 0);
        assert_eq!(read_logs(&journal_path).unwrap().len(), 1);
    }
}
