//! The actions behind each CLI subcommand.
//!
//! Each action takes a loaded [`StudyConfig`] and its [`StudyPaths`] and
//! returns a summary for the caller to print; none of them prompt.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use venue_map_acquisition::{
    AcquisitionError, AcquisitionOptions, AcquisitionSummary, ApiError, CsvJobStore, FaultLog,
    HttpPlacesApi, JobStore, JobStoreError, PlacesApi, PlacesFetcher, ProgressCallback, SinkError,
    TileBatch, TileDirectory,
};
use venue_map_analysis::{AnalysisError, CleanResult, aggregate, clean, output};
use venue_map_grid::budget::{CallEstimate, check_budget, estimate_calls};
use venue_map_grid::{DegreeScale, GridConfig, GridError, filter_to_region, generate_grid};
use venue_map_places_models::study::StudyConfig;
use venue_map_places_models::{DensityMetric, SamplingPoint};
use venue_map_spatial::{
    District, DistrictFieldMapping, DistrictIndex, SpatialError, StudyArea, load_districts,
};

use crate::config::{self, ConfigError};
use crate::paths::StudyPaths;

/// Errors from any pipeline action.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid study settings or a missing API key.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Invalid region, radius, or a plan over the call budget.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// District or study-area reference data could not be loaded.
    #[error(transparent)]
    Spatial(#[from] SpatialError),
    /// The checkpoint could not be read or written.
    #[error(transparent)]
    JobStore(#[from] JobStoreError),
    /// The HTTP client could not be built.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Acquisition could not persist its progress.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    /// Tile files could not be read.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Analysis outputs could not be written.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// `init` would discard an existing checkpoint with progress.
    #[error("Checkpoint {path} already has {done} done points; pass --force to overwrite it")]
    CheckpointInUse {
        /// Checkpoint path.
        path: String,
        /// Points already done.
        done: usize,
    },

    /// Filesystem error outside the checkpoint and tiles.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// District reference data and the study polygon.
pub struct Reference {
    /// Districts in file order.
    pub districts: Vec<District>,
    /// Study polygon.
    pub study_area: StudyArea,
}

/// Loads districts and the study polygon named in the study config.
///
/// # Errors
///
/// Returns [`PipelineError::Spatial`] if either file cannot be loaded.
pub fn load_reference(study: &StudyConfig) -> Result<Reference, PipelineError> {
    let mapping = DistrictFieldMapping::from(&study.districts);
    let districts = load_districts(Path::new(&study.districts.path), &mapping)?;
    let study_area = match &study.districts.study_area {
        Some(path) => StudyArea::load(Path::new(path))?,
        None => StudyArea::from_districts(&districts),
    };
    Ok(Reference {
        districts,
        study_area,
    })
}

/// A generated (and possibly clipped) grid with its cost estimate.
#[derive(Debug)]
pub struct GridPlan {
    /// Points before clipping.
    pub generated: usize,
    /// Points to fetch.
    pub points: Vec<SamplingPoint>,
    /// API call bounds for `points`.
    pub estimate: CallEstimate,
}

fn grid_config(study: &StudyConfig) -> GridConfig {
    GridConfig::new(study.region, study.grid.radius_meters).with_scale(DegreeScale {
        meters_per_degree_lat: study.grid.meters_per_degree_lat,
        meters_per_degree_lng: study.grid.meters_per_degree_lng,
    })
}

/// Generates the grid, clips it to `study_area` when the study asks for
/// it, and estimates the call count.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] for pagination settings beyond the
/// API's limits, or [`PipelineError::Grid`] for an invalid region, radius,
/// or scale.
pub fn plan_grid(
    study: &StudyConfig,
    study_area: Option<&StudyArea>,
) -> Result<GridPlan, PipelineError> {
    config::validate_api(&study.api)?;
    let generated = generate_grid(&grid_config(study))?;
    let generated_count = generated.len();

    let points = match study_area {
        Some(area) if study.grid.clip_to_study_area => {
            let clipped = filter_to_region(&generated, area.polygon());
            log::info!(
                "Clipped grid from {generated_count} to {} points",
                clipped.len()
            );
            clipped
        }
        _ => generated,
    };

    let estimate = estimate_calls(points.len() as u64, study.api.max_pages);
    Ok(GridPlan {
        generated: generated_count,
        points,
        estimate,
    })
}

/// Builds the grid plan, loading the study polygon only if clipping is
/// enabled.
///
/// # Errors
///
/// Returns [`PipelineError`] if reference data or the grid is invalid.
pub fn plan(study: &StudyConfig) -> Result<GridPlan, PipelineError> {
    let reference = if study.grid.clip_to_study_area {
        Some(load_reference(study)?)
    } else {
        None
    };
    plan_grid(study, reference.as_ref().map(|r| &r.study_area))
}

/// Writes a fresh checkpoint for the planned grid.
///
/// Refuses to replace a checkpoint that already has done points unless
/// `force` is set.
///
/// # Errors
///
/// Returns [`PipelineError`] if the plan is over budget, the checkpoint is
/// in use, or the write fails.
pub fn init(
    study: &StudyConfig,
    paths: &StudyPaths,
    force: bool,
) -> Result<CsvJobStore, PipelineError> {
    let checkpoint = paths.checkpoint();
    if !force && CsvJobStore::exists(&checkpoint) {
        let existing = CsvJobStore::load(&checkpoint)?;
        let done = existing.done_count();
        if done > 0 {
            return Err(PipelineError::CheckpointInUse {
                path: checkpoint.display().to_string(),
                done,
            });
        }
    }

    let plan = plan(study)?;
    check_budget(&plan.estimate, study.api.call_budget)?;
    Ok(CsvJobStore::create(&checkpoint, plan.points)?)
}

/// Resumes acquisition against the live API, creating the checkpoint
/// first if there is none.
///
/// # Errors
///
/// Returns [`PipelineError`] on configuration faults or if progress cannot
/// be persisted. Per-point fetch faults are logged, not returned.
#[allow(clippy::future_not_send)]
pub async fn fetch(
    study: &StudyConfig,
    paths: &StudyPaths,
    limit: Option<u64>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<AcquisitionSummary, PipelineError> {
    let key = config::api_key(&study.api)?;
    let api = HttpPlacesApi::from_settings(&study.api, key)?;

    let mut store = if CsvJobStore::exists(&paths.checkpoint()) {
        CsvJobStore::load(&paths.checkpoint())?
    } else {
        log::info!("No checkpoint yet, initializing one");
        init(study, paths, false)?
    };

    fetch_with(study, paths, &mut store, api, limit, progress).await
}

/// Runs acquisition for `store` through `api`, writing tiles and faults
/// under `paths`.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] before any call if the pagination
/// settings exceed the API's limits, or [`PipelineError::Acquisition`] if
/// progress cannot be persisted.
#[allow(clippy::future_not_send)]
pub async fn fetch_with<S: JobStore, A: PlacesApi>(
    study: &StudyConfig,
    paths: &StudyPaths,
    store: &mut S,
    api: A,
    limit: Option<u64>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<AcquisitionSummary, PipelineError> {
    config::validate_api(&study.api)?;
    let fetcher = PlacesFetcher::new(api)
        .with_page_delay(Duration::from_secs(study.api.page_delay_secs))
        .with_max_pages(study.api.max_pages);
    let mut tiles = TileDirectory::new(paths.tiles_dir());
    let mut faults = FaultLog::new(paths.fault_log());

    Ok(venue_map_acquisition::run(
        store,
        &fetcher,
        &mut tiles,
        &mut faults,
        AcquisitionOptions { limit },
        progress,
    )
    .await?)
}

/// Checkpoint and output counts for a study.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Points in the checkpoint.
    pub total: usize,
    /// Points marked done.
    pub done: usize,
    /// Points still pending.
    pub pending: usize,
    /// Tile files written.
    pub tiles: usize,
    /// Entries in the fault log.
    pub faults: usize,
}

/// Reads progress from disk. Returns `None` when there is no checkpoint.
///
/// # Errors
///
/// Returns [`PipelineError`] if the checkpoint, tiles, or fault log cannot
/// be read.
pub fn status(paths: &StudyPaths) -> Result<Option<StatusReport>, PipelineError> {
    if !CsvJobStore::exists(&paths.checkpoint()) {
        return Ok(None);
    }
    let store = CsvJobStore::load(&paths.checkpoint())?;
    let tiles = TileDirectory::new(paths.tiles_dir()).tile_count()?;
    let faults = FaultLog::count(&paths.fault_log()).map_err(|source| PipelineError::Io {
        path: paths.fault_log().display().to_string(),
        source,
    })?;

    Ok(Some(StatusReport {
        total: store.entries().len(),
        done: store.done_count(),
        pending: store.pending_count(),
        tiles,
        faults,
    }))
}

/// Cleaned places and their district metrics.
pub struct Analysis {
    /// Clean places and the data-quality report.
    pub cleaned: CleanResult,
    /// One metric per district.
    pub metrics: Vec<DensityMetric>,
}

/// Cleans `batches` and aggregates the result per district.
#[must_use]
pub fn analyze_batches(batches: &[TileBatch], reference: Reference) -> Analysis {
    let Reference {
        districts,
        study_area,
    } = reference;
    let index = DistrictIndex::new(districts);
    let cleaned = clean(batches, &study_area, &index);
    let metrics = aggregate(&cleaned.places, index.districts());
    Analysis { cleaned, metrics }
}

/// Reads every tile, cleans and aggregates, and writes the outputs under
/// the generated directory.
///
/// # Errors
///
/// Returns [`PipelineError`] if inputs cannot be read or outputs written.
pub fn analyze(study: &StudyConfig, paths: &StudyPaths) -> Result<Analysis, PipelineError> {
    let reference = load_reference(study)?;
    let districts = reference.districts.clone();
    let batches = TileDirectory::new(paths.tiles_dir()).read_all()?;
    log::info!("Analyzing {} tiles", batches.len());

    let analysis = analyze_batches(&batches, reference);
    output::write_places_csv(&paths.places_csv(), &analysis.cleaned.places)?;
    output::write_metrics_csv(&paths.metrics_csv(), &analysis.metrics)?;
    output::write_metrics_geojson(&paths.metrics_geojson(), &analysis.metrics, &districts)?;
    output::write_report(&paths.report_json(), &analysis.cleaned.report)?;

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use venue_map_acquisition::{InMemoryJobStore, PageQuery, SearchPage, null_progress};
    use venue_map_places_models::BoundingRegion;
    use venue_map_spatial::parse_districts;

    use super::*;

    struct QueuedApi {
        pages: Mutex<VecDeque<SearchPage>>,
        calls: Arc<AtomicUsize>,
    }

    impl QueuedApi {
        fn new(pages: Vec<SearchPage>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PlacesApi for QueuedApi {
        async fn search(&self, _query: &PageQuery) -> Result<SearchPage, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn place(id: &str, lng: f64, lat: f64) -> serde_json::Value {
        serde_json::json!({
            "place_id": id,
            "name": id,
            "geometry": {"location": {"lat": lat, "lng": lng}},
            "rating": 4.0,
            "types": ["cafe", "point_of_interest", "establishment"]
        })
    }

    const DISTRICTS: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"id": "q1", "name": "Only", "arr": "1", "surface": 1000000},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[0.002,0],[0.002,0.002],[0,0.002],[0,0]]]}}
    ]}"#;

    fn study(data_dir: &Path) -> StudyConfig {
        let toml = format!(
            r#"
            id = "tiny"
            name = "Tiny"
            data_dir = "{}"

            [region]
            north = 0.002
            south = 0.0
            east = 0.002
            west = 0.0

            [grid]
            radius_meters = 73.0

            [api]
            page_delay_secs = 10

            [districts]
            path = "unused.geojson"
            id_field = "id"
            name_field = "name"
            arrondissement_field = "arr"
            surface_field = "surface"
            "#,
            data_dir.display()
        );
        toml::from_str(&toml).unwrap()
    }

    fn reference() -> Reference {
        let mapping = DistrictFieldMapping {
            id: "id".to_string(),
            name: "name".to_string(),
            arrondissement: "arr".to_string(),
            surface_area: Some("surface".to_string()),
        };
        let districts = parse_districts(DISTRICTS, &mapping).unwrap();
        let study_area = StudyArea::from_districts(&districts);
        Reference {
            districts,
            study_area,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "venue_map_pipeline_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn plan_clips_to_the_study_area() {
        let dir = temp_dir("plan");
        let study = study(&dir);
        let reference = reference();

        let unclipped = plan_grid(&study, None).unwrap();
        assert_eq!(unclipped.points.len(), 6);
        assert_eq!(unclipped.estimate.max_calls, 18);

        let clipped = plan_grid(&study, Some(&reference.study_area)).unwrap();
        assert_eq!(clipped.generated, 6);
        assert!(clipped.points.len() <= 6);
        assert!(
            clipped
                .points
                .iter()
                .all(|p| reference.study_area.covers(p.longitude, p.latitude))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_then_analyze_counts_each_venue_once() {
        let dir = temp_dir("end_to_end");
        let study = study(&dir);
        let paths = StudyPaths::from_config(&study);
        let plan = plan_grid(&study, None).unwrap();
        let mut store = InMemoryJobStore::new(plan.points).unwrap();

        let api = QueuedApi::new(vec![
            SearchPage {
                results: vec![
                    place("a", 0.0005, 0.0005),
                    place("b", 0.001, 0.001),
                    place("a", 0.0005, 0.0005),
                ],
                next_page_token: None,
            },
            SearchPage {
                results: vec![place("c", 0.0015, 0.0015)],
                next_page_token: None,
            },
        ]);

        let summary = fetch_with(&study, &paths, &mut store, api, None, &null_progress())
            .await
            .unwrap();
        assert_eq!(summary.processed, 6);
        assert_eq!(summary.records, 4);
        assert_eq!(store.pending_count(), 0);

        let batches = TileDirectory::new(paths.tiles_dir()).read_all().unwrap();
        assert_eq!(batches.len(), 6);

        let analysis = analyze_batches(&batches, reference());
        assert_eq!(analysis.cleaned.places.len(), 3);
        assert_eq!(analysis.cleaned.report.duplicates, 1);
        assert_eq!(analysis.metrics.len(), 1);
        assert_eq!(analysis.metrics[0].count, 3);
        assert!((analysis.metrics[0].density_per_sq_km - 3.0).abs() < 1e-12);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(start_paused = true)]
    async fn pagination_beyond_api_limits_is_rejected_before_any_call() {
        let dir = temp_dir("api_limits");
        let mut study = study(&dir);
        study.grid.clip_to_study_area = false;
        study.api.page_delay_secs = 0;
        study.api.max_pages = 6;
        let paths = StudyPaths::from_config(&study);
        let plan = {
            let mut valid = study.clone();
            valid.api.page_delay_secs = 10;
            valid.api.max_pages = 3;
            plan_grid(&valid, None).unwrap()
        };
        let mut store = InMemoryJobStore::new(plan.points).unwrap();

        let api = QueuedApi::new(vec![SearchPage {
            results: vec![place("a", 0.0005, 0.0005)],
            next_page_token: Some("token".to_string()),
        }]);
        let calls = Arc::clone(&api.calls);

        let result = fetch_with(&study, &paths, &mut store, api, None, &null_progress()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::ApiLimit {
                field: "page_delay_secs",
                ..
            }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.pending_count(), 6);
        assert!(!paths.tiles_dir().exists());

        study.api.page_delay_secs = 10;
        assert!(matches!(
            plan_grid(&study, None),
            Err(PipelineError::Config(ConfigError::ApiLimit {
                field: "max_pages",
                value: 6,
                ..
            }))
        ));
        assert!(matches!(
            init(&study, &paths, false),
            Err(PipelineError::Config(ConfigError::ApiLimit { .. }))
        ));
        assert!(status(&paths).unwrap().is_none());
    }

    #[test]
    fn init_refuses_to_discard_progress() {
        let dir = temp_dir("init");
        let mut study = study(&dir);
        study.grid.clip_to_study_area = false;
        let paths = StudyPaths::from_config(&study);

        let mut store = init(&study, &paths, false).unwrap();
        assert_eq!(store.entries().len(), 6);

        // Re-initializing untouched progress is allowed.
        init(&study, &paths, false).unwrap();

        store = CsvJobStore::load(&paths.checkpoint()).unwrap();
        store.mark_done(0).unwrap();
        assert!(matches!(
            init(&study, &paths, false),
            Err(PipelineError::CheckpointInUse { done: 1, .. })
        ));

        let fresh = init(&study, &paths, true).unwrap();
        assert_eq!(fresh.done_count(), 0);

        let report = status(&paths).unwrap().unwrap();
        assert_eq!(report.total, 6);
        assert_eq!(report.pending, 6);
        assert_eq!(report.tiles, 0);
        assert_eq!(report.faults, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn over_budget_plan_is_rejected() {
        let dir = temp_dir("budget");
        let mut study = study(&dir);
        study.grid.clip_to_study_area = false;
        study.api.call_budget = Some(5);
        let paths = StudyPaths::from_config(&study);

        assert!(matches!(
            init(&study, &paths, false),
            Err(PipelineError::Grid(GridError::OverBudget { .. }))
        ));
        assert!(status(&paths).unwrap().is_none());
    }

    #[test]
    fn missing_checkpoint_has_no_status() {
        let paths = StudyPaths::new(temp_dir("status"));
        assert!(status(&paths).unwrap().is_none());
    }
}
