//! Per-point result storage.
//!
//! Each sampling point produces exactly one [`TileBatch`], keyed by the
//! point index. Writing a batch for an index that already has one replaces
//! it, so re-fetching a point never duplicates its records.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use venue_map_places_models::RawPlaceRecord;

/// Sink failures.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Filesystem error on a tile file.
    #[error("Tile I/O error on {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A tile file could not be encoded or decoded.
    #[error("Tile JSON error on {path}: {source}")]
    Json {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// The records fetched for one sampling point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileBatch {
    /// Sampling point index.
    pub index: u64,
    /// Records in page order.
    pub records: Vec<RawPlaceRecord>,
}

/// Destination for fetched batches.
pub trait TileSink {
    /// Stores the batch for `index`, replacing any previous batch.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the batch cannot be stored durably.
    fn write_batch(&mut self, index: u64, records: &[RawPlaceRecord]) -> Result<(), SinkError>;
}

/// Directory holding one `tile_<index>.json` file per sampling point.
///
/// Each tile is written to `<tile>.json.tmp`, synced, then renamed, so a
/// tile is durable before the checkpoint marks its point done.
#[derive(Debug, Clone)]
pub struct TileDirectory {
    root: PathBuf,
}

impl TileDirectory {
    /// Uses `root` as the tile directory. It is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the tile file for `index`.
    #[must_use]
    pub fn tile_path(&self, index: u64) -> PathBuf {
        self.root.join(format!("tile_{index:06}.json"))
    }

    /// Reads every tile, ordered by index.
    ///
    /// A missing directory yields no batches.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if a tile cannot be read or parsed.
    pub fn read_all(&self) -> Result<Vec<TileBatch>, SinkError> {
        let mut batches = Vec::new();
        for path in self.tile_files()? {
            let body = std::fs::read(&path).map_err(|source| SinkError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let batch: TileBatch =
                serde_json::from_slice(&body).map_err(|source| SinkError::Json {
                    path: path.display().to_string(),
                    source,
                })?;
            batches.push(batch);
        }
        batches.sort_by_key(|b| b.index);
        log::debug!(
            "Read {} tiles from {}",
            batches.len(),
            self.root.display()
        );
        Ok(batches)
    }

    /// Number of tile files present.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if the directory cannot be listed.
    pub fn tile_count(&self) -> Result<usize, SinkError> {
        Ok(self.tile_files()?.len())
    }

    fn tile_files(&self) -> Result<Vec<PathBuf>, SinkError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SinkError::Io {
                    path: self.root.display().to_string(),
                    source,
                });
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| SinkError::Io {
                    path: self.root.display().to_string(),
                    source,
                })?
                .path();
            let is_tile = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("tile_") && n.ends_with(".json"));
            if is_tile {
                files.push(path);
            }
        }
        Ok(files)
    }
}

impl TileSink for TileDirectory {
    fn write_batch(&mut self, index: u64, records: &[RawPlaceRecord]) -> Result<(), SinkError> {
        let io_err = |path: &Path, source| SinkError::Io {
            path: path.display().to_string(),
            source,
        };

        std::fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;

        let path = self.tile_path(index);
        let tmp = path.with_extension("json.tmp");
        let batch = TileBatch {
            index,
            records: records.to_vec(),
        };
        let body = serde_json::to_vec_pretty(&batch).map_err(|source| SinkError::Json {
            path: path.display().to_string(),
            source,
        })?;

        let mut file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        file.write_all(&body).map_err(|e| io_err(&tmp, e))?;
        file.sync_all().map_err(|e| io_err(&tmp, e))?;
        drop(file);
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        log::trace!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }
}

/// Sink that keeps batches in memory, keyed by index.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: BTreeMap<u64, Vec<RawPlaceRecord>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored batches in index order.
    #[must_use]
    pub fn batches(&self) -> Vec<TileBatch> {
        self.batches
            .iter()
            .map(|(&index, records)| TileBatch {
                index,
                records: records.clone(),
            })
            .collect()
    }

    /// Number of stored batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether no batch has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl TileSink for MemorySink {
    fn write_batch(&mut self, index: u64, records: &[RawPlaceRecord]) -> Result<(), SinkError> {
        self.batches.insert(index, records.to_vec());
        Ok(())
    }
}
