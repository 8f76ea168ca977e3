//! Durable record of which sampling points have been fetched.
//!
//! The acquisition loop only talks to the [`JobStore`] trait. The
//! production store ([`CsvJobStore`]) keeps the whole grid in a CSV
//! checkpoint with the columns `index, longitude, latitude, radius, done`
//! and rewrites it after every point. [`InMemoryJobStore`] backs tests.

use std::fs::File;
use std::path::{Path, PathBuf};

use venue_map_places_models::SamplingPoint;

/// Job store failures.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    /// Filesystem error on the checkpoint.
    #[error("Checkpoint I/O error on {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The checkpoint could not be read or written as CSV.
    #[error("Checkpoint CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `mark_done` was called with an index the store does not hold.
    #[error("Unknown sampling point index: {index}")]
    UnknownIndex {
        /// The missing index.
        index: u64,
    },

    /// The checkpoint lists the same index twice.
    #[error("Duplicate sampling point index in checkpoint: {index}")]
    DuplicateIndex {
        /// The repeated index.
        index: u64,
    },
}

/// Mapping from sampling point index to its point and done flag.
///
/// Entries are always held in ascending index order.
pub trait JobStore {
    /// All entries, ordered by index.
    fn entries(&self) -> &[SamplingPoint];

    /// Flags `index` as done and persists the change before returning.
    ///
    /// Marking an already-done point is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::UnknownIndex`] for an index the store does
    /// not hold, or a persistence error.
    fn mark_done(&mut self, index: u64) -> Result<(), JobStoreError>;

    /// Entries not yet done, in index order.
    fn pending_entries(&self) -> impl Iterator<Item = &SamplingPoint> {
        self.entries().iter().filter(|p| !p.done)
    }

    /// First pending entry with an index of at least `from`.
    fn next_pending(&self, from: u64) -> Option<&SamplingPoint> {
        let entries = self.entries();
        let start = entries.partition_point(|p| p.index < from);
        entries[start..].iter().find(|p| !p.done)
    }

    /// Number of entries already done.
    fn done_count(&self) -> usize {
        self.entries().iter().filter(|p| p.done).count()
    }

    /// Number of entries still pending.
    fn pending_count(&self) -> usize {
        self.entries().len() - self.done_count()
    }
}

fn sorted_unique(mut points: Vec<SamplingPoint>) -> Result<Vec<SamplingPoint>, JobStoreError> {
    points.sort_by_key(|p| p.index);
    if let Some(pair) = points.windows(2).find(|w| w[0].index == w[1].index) {
        return Err(JobStoreError::DuplicateIndex {
            index: pair[0].index,
        });
    }
    Ok(points)
}

fn position_of(entries: &[SamplingPoint], index: u64) -> Result<usize, JobStoreError> {
    entries
        .binary_search_by_key(&index, |p| p.index)
        .map_err(|_| JobStoreError::UnknownIndex { index })
}

/// Job store kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    entries: Vec<SamplingPoint>,
}

impl InMemoryJobStore {
    /// Creates a store over `points`.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::DuplicateIndex`] if two points share an
    /// index.
    pub fn new(points: Vec<SamplingPoint>) -> Result<Self, JobStoreError> {
        Ok(Self {
            entries: sorted_unique(points)?,
        })
    }
}

impl JobStore for InMemoryJobStore {
    fn entries(&self) -> &[SamplingPoint] {
        &self.entries
    }

    fn mark_done(&mut self, index: u64) -> Result<(), JobStoreError> {
        let position = position_of(&self.entries, index)?;
        self.entries[position].done = true;
        Ok(())
    }
}

/// Job store persisted as a CSV checkpoint.
///
/// Every write goes to `<path>.tmp`, is synced, then renamed over the
/// checkpoint, so a crash leaves either the previous or the new table
/// on disk and never a truncated one.
#[derive(Debug)]
pub struct CsvJobStore {
    path: PathBuf,
    entries: Vec<SamplingPoint>,
}

impl CsvJobStore {
    /// Writes a fresh checkpoint for `points`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError`] on duplicate indices or write failure.
    pub fn create(path: &Path, points: Vec<SamplingPoint>) -> Result<Self, JobStoreError> {
        let store = Self {
            path: path.to_path_buf(),
            entries: sorted_unique(points)?,
        };
        store.persist()?;
        log::info!(
            "Wrote checkpoint with {} points to {}",
            store.entries.len(),
            path.display()
        );
        Ok(store)
    }

    /// Reads an existing checkpoint.
    ///
    /// A leftover temporary file from an interrupted write is discarded:
    /// the rename never happened, so the checkpoint itself is the last
    /// complete state.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError`] if the checkpoint cannot be read or holds
    /// duplicate indices.
    pub fn load(path: &Path) -> Result<Self, JobStoreError> {
        let tmp = tmp_path(path);
        if tmp.exists() {
            log::warn!("Removing stale checkpoint temp file {}", tmp.display());
            std::fs::remove_file(&tmp).map_err(|source| JobStoreError::Io {
                path: tmp.display().to_string(),
                source,
            })?;
        }

        let file = File::open(path).map_err(|source| JobStoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(file);
        let points = reader
            .deserialize()
            .collect::<Result<Vec<SamplingPoint>, _>>()?;

        let store = Self {
            path: path.to_path_buf(),
            entries: sorted_unique(points)?,
        };
        log::debug!(
            "Loaded checkpoint {}: {} done, {} pending",
            path.display(),
            store.done_count(),
            store.pending_count()
        );
        Ok(store)
    }

    /// Whether a checkpoint exists at `path`.
    #[must_use]
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Location of the checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), JobStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let tmp = tmp_path(&self.path);
        let file = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut writer = csv::Writer::from_writer(file);
        for point in &self.entries {
            writer.serialize(point)?;
        }
        let file = writer
            .into_inner()
            .map_err(|e| io_err(&tmp)(e.into_error()))?;
        file.sync_all().map_err(io_err(&tmp))?;
        drop(file);

        std::fs::rename(&tmp, &self.path).map_err(io_err(&self.path))
    }
}

impl JobStore for CsvJobStore {
    fn entries(&self) -> &[SamplingPoint] {
        &self.entries
    }

    fn mark_done(&mut self, index: u64) -> Result<(), JobStoreError> {
        let position = position_of(&self.entries, index)?;
        if self.entries[position].done {
            return Ok(());
        }
        self.entries[position].done = true;
        if let Err(e) = self.persist() {
            self.entries[position].done = false;
            return Err(e);
        }
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> JobStoreError + use<> {
    let path = path.display().to_string();
    move |source| JobStoreError::Io { path, source }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
