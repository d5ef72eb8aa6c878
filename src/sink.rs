// src/sink.rs

//! The output sink: one append-only file per validation attempt.
//!
//! The compile step and the run step both append their combined
//! stdout/stderr here, and the orchestrator appends `>>>> PiT:` diagnostic
//! lines. The sink is always read in full; it stays small enough for that
//! to be cheap, and it avoids matching on half-written chunk boundaries.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{PitError, Result};
use crate::types::{platform_label, Mode};

/// Prefix of every line the orchestrator itself writes into a sink.
pub const DIAGNOSTIC_PREFIX: &str = ">>>> PiT:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    path: PathBuf,
}

impl Sink {
    /// Deterministic sink file name: `{app}-{mode}-{version}-{platform}.out`.
    pub fn file_name(app: &str, mode: Mode, version: &str) -> String {
        format!("{app}-{mode}-{version}-{}.out", platform_label())
    }

    /// Create (or truncate) the sink at `path`, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PitError::sink(&path, e))?;
            }
        }
        File::create(&path).map_err(|e| PitError::sink(&path, e))?;
        debug!(sink = ?path, "created sink");
        Ok(Self { path })
    }

    /// [`Sink::create`], then delete the backups `1..=backups` an earlier run
    /// may have left next to it.
    pub fn create_clean(path: impl Into<PathBuf>, backups: u32) -> Result<Self> {
        let sink = Self::create(path)?;
        sink.remove_backups(backups)?;
        Ok(sink)
    }

    /// Refer to an existing sink without touching its contents.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Open an append handle, e.g. to redirect a child's stdout/stderr.
    pub fn append_handle(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PitError::sink(&self.path, e))
    }

    /// Append a single line (a trailing newline is added).
    pub fn append_line(&self, line: &str) -> Result<()> {
        let mut file = self.append_handle()?;
        writeln!(file, "{line}").map_err(|e| PitError::sink(&self.path, e))
    }

    /// Append a `>>>> PiT: ...` diagnostic line.
    pub fn append_diagnostic(&self, message: &str) -> Result<()> {
        self.append_line(&format!("{DIAGNOSTIC_PREFIX} {message}"))
    }

    /// Full current contents. A missing sink reads as empty; invalid UTF-8
    /// is replaced rather than rejected.
    pub fn read(&self) -> Result<String> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(PitError::sink(&self.path, e)),
        }
    }

    /// Path of the numbered backup for `attempt`, e.g. `app.out.1`.
    pub fn backup_path(&self, attempt: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{attempt}"));
        PathBuf::from(name)
    }

    /// Move the current contents to the numbered backup for `attempt` and
    /// start over with an empty sink at the original path.
    pub fn rotate(&self, attempt: u32) -> Result<PathBuf> {
        let backup = self.backup_path(attempt);
        if self.exists() {
            fs::rename(&self.path, &backup).map_err(|e| PitError::sink(&self.path, e))?;
        }
        File::create(&self.path).map_err(|e| PitError::sink(&self.path, e))?;
        debug!(sink = ?self.path, backup = ?backup, "rotated sink");
        Ok(backup)
    }

    /// Delete the sink. Already gone is fine.
    pub fn remove(&self) -> Result<()> {
        remove_if_present(&self.path)
    }

    /// Delete the backups of attempts `1..=attempts`.
    pub fn remove_backups(&self, attempts: u32) -> Result<()> {
        for attempt in 1..=attempts {
            remove_if_present(&self.backup_path(attempt))?;
        }
        Ok(())
    }

    /// Delete the sink and the backups of attempts `1..=attempts`.
    pub fn remove_with_backups(&self, attempts: u32) -> Result<()> {
        self.remove()?;
        self.remove_backups(attempts)
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PitError::sink(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_deterministic() {
        let name = Sink::file_name("hello", Mode::Dev, "24.8.0");
        assert_eq!(name, format!("hello-dev-24.8.0-{}.out", platform_label()));
    }

    #[test]
    fn rotate_keeps_backup_and_empties_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::create(dir.path().join("app.out")).unwrap();
        sink.append_line("first attempt").unwrap();

        let backup = sink.rotate(1).unwrap();

        assert_eq!(backup, dir.path().join("app.out.1"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "first attempt\n");
        assert_eq!(sink.read().unwrap(), "");
    }

    #[test]
    fn create_clean_drops_stale_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.out");
        fs::write(&path, "old run\n").unwrap();
        fs::write(dir.path().join("app.out.1"), "old attempt 1\n").unwrap();
        fs::write(dir.path().join("app.out.2"), "old attempt 2\n").unwrap();
        fs::write(dir.path().join("app.out.9"), "outside the cap\n").unwrap();

        let sink = Sink::create_clean(&path, 3).unwrap();

        assert_eq!(sink.read().unwrap(), "");
        assert!(!sink.backup_path(1).exists());
        assert!(!sink.backup_path(2).exists());
        assert!(dir.path().join("app.out.9").exists());
    }

    #[test]
    fn missing_sink_reads_empty_and_removes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::at(dir.path().join("never-created.out"));
        assert_eq!(sink.read().unwrap(), "");
        sink.remove().unwrap();
        sink.remove_with_backups(3).unwrap();
    }
}
