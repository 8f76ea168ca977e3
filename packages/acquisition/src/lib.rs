#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resumable place acquisition over a sampling grid.
//!
//! The pieces compose as follows: a [`JobStore`] holds the grid and the
//! per-point done flags, a [`PlacesFetcher`] runs the paginated search
//! for one point through a [`PlacesApi`], and [`run`] drives them,
//! writing one batch per point into a [`TileSink`] and every failure into
//! a [`FaultSink`].

pub mod acquire;
pub mod api;
pub mod faults;
pub mod fetcher;
pub mod job_store;
pub mod progress;
pub mod sink;

pub use acquire::{AcquisitionError, AcquisitionOptions, AcquisitionSummary, run};
pub use api::{ApiError, HttpPlacesApi, PageQuery, PlacesApi, SearchPage};
pub use faults::{FaultEntry, FaultLog, FaultSink};
pub use fetcher::{FetchOutcome, FetchedPages, PlacesFetcher};
pub use job_store::{CsvJobStore, InMemoryJobStore, JobStore, JobStoreError};
pub use progress::{LogProgress, NullProgress, ProgressCallback, null_progress};
pub use sink::{MemorySink, SinkError, TileBatch, TileDirectory, TileSink};
