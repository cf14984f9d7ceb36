//! Append-only run ledger ("done file").
//!
//! One ledger per pipeline step records the runs that step has completed,
//! one trimmed run id per line. Reading is set-semantics (duplicates on
//! disk are tolerated); writing appends under an exclusive advisory lock so
//! cooperating processes never interleave partial lines. The ledger alone
//! does not give exactly-once processing: callers must re-check membership
//! after claiming a run (see the recipe module).

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::run::RunId;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("cannot read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot append to ledger {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot lock ledger {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LedgerError {
    fn read(path: &Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    fn append(path: &Path, source: io::Error) -> Self {
        Self::Append {
            path: path.to_path_buf(),
            source,
        }
    }

    fn lock(path: &Path, source: io::Error) -> Self {
        Self::Lock {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Persistent set of run ids already processed by one step.
#[derive(Debug, Clone)]
pub struct RunLedger {
    path: PathBuf,
}

impl RunLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the full set of recorded run ids.
    ///
    /// A missing ledger file is an empty set, not an error: first run of a
    /// fresh installation.
    pub fn load(&self) -> Result<HashSet<RunId>, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(LedgerError::read(&self.path, e)),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(RunId::new)
            .collect())
    }

    /// Fresh membership check, re-reading the file.
    pub fn contains(&self, run_id: &RunId) -> Result<bool, LedgerError> {
        Ok(self.load()?.contains(run_id))
    }

    /// Appends one run id.
    ///
    /// The exclusive advisory lock is scoped to this single write; it is
    /// released before returning, never held across run processing.
    pub fn add(&self, run_id: &RunId) -> Result<(), LedgerError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| LedgerError::append(&self.path, e))?;

        file.lock_exclusive()
            .map_err(|e| LedgerError::lock(&self.path, e))?;

        let write_result =
            Self::write_entry(&mut file, run_id).map_err(|e| LedgerError::append(&self.path, e));
        let unlock_result =
            fs2::FileExt::unlock(&file).map_err(|e| LedgerError::lock(&self.path, e));

        write_result?;
        unlock_result
    }

    fn write_entry(file: &mut File, run_id: &RunId) -> io::Result<()> {
        // Seek after taking the lock: another writer may have grown the
        // file since open.
        file.seek(SeekFrom::End(0))?;
        writeln!(file, "{run_id}")?;
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_in(dir: &TempDir) -> RunLedger {
        RunLedger::new(dir.path().join("sync.done"))
    }

    #[test]
    fn test_load_missing_file_is_empty_set() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        assert!(ledger.load().unwrap().is_empty());
    }

    #[test]
    fn test_add_then_load_contains() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        let run = RunId::new("240115_NB500892_0123_AHABCDEFXX");

        ledger.add(&run).unwrap();

        let loaded = ledger.load().unwrap();
        assert!(loaded.contains(&run));
        assert_eq!(loaded.len(), 1);
        assert!(ledger.contains(&run).unwrap());
    }

    #[test]
    fn test_add_appends_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);

        ledger.add(&RunId::new("RUN001")).unwrap();
        ledger.add(&RunId::new("RUN002")).unwrap();

        let raw = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(raw, "RUN001\nRUN002\n");
    }

    #[test]
    fn test_duplicate_entries_dedup_on_read() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        let run = RunId::new("RUN001");

        ledger.add(&run).unwrap();
        ledger.add(&run).unwrap();

        let raw = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert_eq!(ledger.load().unwrap().len(), 1);
    }

    #[test]
    fn test_load_trims_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demux.done");
        fs::write(&path, "  RUN001  \n\nRUN002\n   \n").unwrap();

        let loaded = RunLedger::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&RunId::new("RUN001")));
        assert!(loaded.contains(&RunId::new("RUN002")));
    }

    #[test]
    fn test_add_preserves_existing_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qc.done");
        fs::write(&path, "RUN001\n").unwrap();

        let ledger = RunLedger::new(&path);
        ledger.add(&RunId::new("RUN002")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "RUN001\nRUN002\n");
    }

    #[test]
    fn test_concurrent_adds_all_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.done");

        let mut handles = Vec::new();
        for t in 0..2 {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                let ledger = RunLedger::new(path);
                for i in 0..20 {
                    ledger.add(&RunId::new(format!("T{t}_RUN{i:03}"))).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let loaded = RunLedger::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 40);
        // Every line is a whole entry, no interleaved partial writes.
        let raw = fs::read_to_string(&path).unwrap();
        for line in raw.lines() {
            assert!(line.starts_with("T0_RUN") || line.starts_with("T1_RUN"));
        }
    }
}
