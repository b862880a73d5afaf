//! Medicine store with file locking.
//!
//! The full medicine list lives in one JSON file. Loads are lenient:
//! a missing or corrupt file yields an empty book with a warning, and
//! entries that fail schedule validation are skipped so they can never
//! reach the engine. Saves are atomic (temp file, sync, rename).

use crate::schedule::validate_medicine;
use crate::{journal, Error, Medicine, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// The user's medicine list
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct MedicineBook {
    pub medicines: Vec<Medicine>,
}

impl MedicineBook {
    /// Load the book from a file with shared locking
    ///
    /// Returns an empty book if the file doesn't exist. If the file is
    /// corrupted, logs a warning and returns an empty book. Entries that
    /// fail schedule validation are warned about and dropped.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No medicine file found, starting empty");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open medicine file {:?}: {}. Starting empty.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        // Acquire shared lock for reading
        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock medicine file {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read medicine file {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        let mut book = match serde_json::from_str::<MedicineBook>(&contents) {
            Ok(book) => book,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse medicine file {:?}: {}. Starting empty.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        book.medicines.retain(|m| match validate_medicine(m) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Dropping invalid medicine '{}': {}", m.name, e);
                false
            }
        });

        tracing::debug!("Loaded {} medicines from {:?}", book.medicines.len(), path);
        Ok(book)
    }

    /// Save the book to a file with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "medicine path missing parent")
        })?)?;

        // Acquire exclusive lock on the temp file to serialize concurrent writers
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        // Atomically replace the old file
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} medicines to {:?}", self.medicines.len(), path);
        Ok(())
    }

    /// Load the book, modify it, and save it back atomically
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut MedicineBook) -> Result<()>,
    {
        let mut book = Self::load(path)?;
        f(&mut book)?;
        book.save(path)?;
        Ok(book)
    }

    /// Medicines sorted for display: by scheduled time, then name
    pub fn list(&self) -> Vec<&Medicine> {
        let mut medicines: Vec<&Medicine> = self.medicines.iter().collect();
        medicines.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)));
        medicines
    }

    pub fn get(&self, id: Uuid) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id == id)
    }

    /// Insert a medicine, replacing any existing entry with the same id
    pub fn upsert(&mut self, medicine: Medicine) {
        match self.medicines.iter_mut().find(|m| m.id == medicine.id) {
            Some(existing) => *existing = medicine,
            None => self.medicines.push(medicine),
        }
    }

    /// Remove a medicine by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.medicines.len();
        self.medicines.retain(|m| m.id != id);
        self.medicines.len() < before
    }

    /// Find a medicine by exact name (case-insensitive) or id prefix.
    ///
    /// Names win over id prefixes. An ambiguous query fails rather than
    /// silently picking one.
    pub fn resolve(&self, query: &str) -> Result<&Medicine> {
        let needle = query.trim();
        if needle.is_empty() {
            return Err(Error::Store("empty medicine name".into()));
        }

        let by_name: Vec<&Medicine> = self
            .medicines
            .iter()
            .filter(|m| m.name.eq_ignore_ascii_case(needle))
            .collect();
        match by_name.len() {
            1 => return Ok(by_name[0]),
            n if n > 1 => {
                return Err(Error::Store(format!(
                    "{} medicines are named '{}'; use an id prefix instead",
                    n, needle
                )))
            }
            _ => {}
        }

        let lowered = needle.to_ascii_lowercase();
        let by_id: Vec<&Medicine> = self
            .medicines
            .iter()
            .filter(|m| m.id.to_string().starts_with(&lowered))
            .collect();
        match by_id.len() {
            1 => Ok(by_id[0]),
            0 => Err(Error::Store(format!("no medicine matches '{}'", needle))),
            n => Err(Error::Store(format!(
                "id prefix '{}' matches {} medicines",
                needle, n
            ))),
        }
    }
}

/// Delete a medicine and cascade to its journal entries.
///
/// The medicine list is saved before the journal purge runs; a crash in
/// between leaves orphaned journal lines, never a medicine missing its
/// history. Returns how many journal entries were purged.
pub fn delete_medicine(book_path: &Path, journal_path: &Path, id: Uuid) -> Result<usize> {
    let mut book = MedicineBook::load(book_path)?;
    if !book.remove(id) {
        return Err(Error::Store(format!("no medicine with id {}", id)));
    }
    book.save(book_path)?;

    journal::purge_medicine(journal_path, id)
}
