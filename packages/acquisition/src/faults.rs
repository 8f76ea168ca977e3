//! Fault log for sampling points whose fetch failed.
//!
//! Failed points are still marked done, so this log is the only record of
//! the coverage gaps a run left behind.

use std::fs::OpenOptions;
use std::io::{BufRead as _, BufReader, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// One failed sampling point.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultEntry {
    /// Sampling point index.
    pub index: u64,
    /// Circle center latitude.
    pub latitude: f64,
    /// Circle center longitude.
    pub longitude: f64,
    /// Circle radius in meters.
    pub radius_meters: f64,
    /// Fault description.
    pub message: String,
    /// When the fault was observed.
    pub at: DateTime<Utc>,
}

impl FaultEntry {
    fn to_line(&self) -> String {
        format!(
            "{}\tindex={}\tlat={}\tlng={}\tradius={}\t{}",
            self.at.to_rfc3339(),
            self.index,
            self.latitude,
            self.longitude,
            self.radius_meters,
            self.message.replace(['\n', '\r'], " ")
        )
    }
}

/// Destination for fault entries.
pub trait FaultSink {
    /// Records one fault.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the fault cannot be stored.
    fn record(&mut self, entry: &FaultEntry) -> std::io::Result<()>;
}

impl FaultSink for Vec<FaultEntry> {
    fn record(&mut self, entry: &FaultEntry) -> std::io::Result<()> {
        self.push(entry.clone());
        Ok(())
    }
}

/// Append-only text file with one tab-separated line per fault.
#[derive(Debug, Clone)]
pub struct FaultLog {
    path: PathBuf,
}

impl FaultLog {
    /// Appends to `path`, creating it on first fault.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of faults recorded in the log at `path`. A missing file
    /// counts as zero.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file exists but cannot be
    /// read.
    pub fn count(path: &Path) -> std::io::Result<usize> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl FaultSink for FaultLog {
    fn record(&mut self, entry: &FaultEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())?;
        file.sync_data()
    }
}
