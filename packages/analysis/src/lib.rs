#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch analysis of acquired places.
//!
//! This phase is a stateless pass over persisted tile batches: [`clean`]
//! deduplicates and attributes venues to districts, [`aggregate`] turns
//! them into per-district density metrics, and [`output`] writes the
//! files handed to the visualization layer.

pub mod aggregate;
pub mod clean;
pub mod output;

pub use aggregate::{aggregate, density_per_sq_km};
pub use clean::{AmbiguousPlace, CleanReport, CleanResult, clean, is_venue};

/// Errors raised while writing analysis outputs.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Filesystem error.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
