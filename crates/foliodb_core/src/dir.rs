//! Database directory management.
//!
//! File system layout:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # advisory lock for single-writer access
//! └─ journal.fdb   # append-only journal
//! ```

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.fdb";

/// Holds the directory layout and the exclusive lock of an open database.
///
/// Only one `DatabaseDir` can exist per directory at a time; the lock is
/// released when the value is dropped.
#[derive(Debug)]
pub(crate) struct DatabaseDir {
    path: PathBuf,
    was_missing: bool,
    /// Lock file handle, held for exclusive access.
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory and acquires its lock.
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        let was_missing = !path.exists();
        if was_missing {
            if !create_if_missing {
                return Err(StoreError::invalid_database(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::DatabaseLocked)?;

        Ok(Self {
            path: path.to_path_buf(),
            was_missing,
            _lock_file: lock_file,
        })
    }

    /// Returns true if the directory was created by this open.
    pub(crate) fn is_new_database(&self) -> bool {
        self.was_missing
    }

    /// Returns the journal file path.
    pub(crate) fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_directory_when_allowed() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let dir = DatabaseDir::open(&path, true).unwrap();
        assert!(dir.is_new_database());
        assert!(path.join(LOCK_FILE).exists());
    }

    #[test]
    fn missing_directory_is_an_error_without_create() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        assert!(DatabaseDir::open(&path, false).is_err());
    }

    #[test]
    fn second_open_is_locked_out() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        let _first = DatabaseDir::open(&path, true).unwrap();
        let second = DatabaseDir::open(&path, true);
        assert!(matches!(second, Err(StoreError::DatabaseLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");

        {
            let _dir = DatabaseDir::open(&path, true).unwrap();
        }
        let reopened = DatabaseDir::open(&path, true).unwrap();
        assert!(!reopened.is_new_database());
    }
}
