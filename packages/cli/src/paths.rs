//! File layout of a study's data directory.
//!
//! ```text
//! <data_dir>/grid.csv            checkpoint
//! <data_dir>/tiles/              one tile_<index>.json per point
//! <data_dir>/faults.log          failed points
//! <data_dir>/generated/          analysis outputs
//! ```

use std::path::{Path, PathBuf};

use venue_map_places_models::study::StudyConfig;

/// Paths derived from a study's data directory.
#[derive(Debug, Clone)]
pub struct StudyPaths {
    data_dir: PathBuf,
}

impl StudyPaths {
    /// Uses `data_dir` as the root.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Uses the study's configured data directory.
    #[must_use]
    pub fn from_config(study: &StudyConfig) -> Self {
        Self::new(&study.data_dir)
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The checkpoint table.
    #[must_use]
    pub fn checkpoint(&self) -> PathBuf {
        self.data_dir.join("grid.csv")
    }

    /// Directory of per-point tile files.
    #[must_use]
    pub fn tiles_dir(&self) -> PathBuf {
        self.data_dir.join("tiles")
    }

    /// The fault log.
    #[must_use]
    pub fn fault_log(&self) -> PathBuf {
        self.data_dir.join("faults.log")
    }

    /// Directory of analysis outputs.
    #[must_use]
    pub fn generated_dir(&self) -> PathBuf {
        self.data_dir.join("generated")
    }

    /// Clean places, one row per venue.
    #[must_use]
    pub fn places_csv(&self) -> PathBuf {
        self.generated_dir().join("places.csv")
    }

    /// Per-district metrics table.
    #[must_use]
    pub fn metrics_csv(&self) -> PathBuf {
        self.generated_dir().join("metrics.csv")
    }

    /// District polygons with their metrics as properties.
    #[must_use]
    pub fn metrics_geojson(&self) -> PathBuf {
        self.generated_dir().join("metrics.geojson")
    }

    /// Data-quality report of the last cleaning pass.
    #[must_use]
    pub fn report_json(&self) -> PathBuf {
        self.generated_dir().join("report.json")
    }
}
