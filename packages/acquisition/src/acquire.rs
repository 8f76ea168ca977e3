//! The acquisition loop.
//!
//! Walks the pending sampling points strictly in index order, one point
//! at a time. For every point the outcome is persisted first (tile batch
//! or fault entry) and the point is then marked done in the job store
//! before the loop advances. A crash therefore loses at most the
//! in-flight point, and a restart resumes exactly where the checkpoint
//! says.

use std::sync::Arc;

use chrono::Utc;

use crate::api::PlacesApi;
use crate::faults::{FaultEntry, FaultSink};
use crate::fetcher::{FetchOutcome, PlacesFetcher};
use crate::job_store::{JobStore, JobStoreError};
use crate::progress::ProgressCallback;
use crate::sink::{SinkError, TileSink};

/// Fatal acquisition failures. Per-point fetch faults are not errors:
/// they are logged and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// The checkpoint could not be updated.
    #[error(transparent)]
    JobStore(#[from] JobStoreError),

    /// A batch could not be stored.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A fault could not be recorded.
    #[error("Failed to record fault for point {index}: {source}")]
    FaultLog {
        /// Point whose fault was being recorded.
        index: u64,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Options for one acquisition run.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquisitionOptions {
    /// Process at most this many pending points.
    pub limit: Option<u64>,
}

/// Totals for one acquisition run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    /// Points handled (and marked done) in this run.
    pub processed: u64,
    /// Points whose fetch completed.
    pub succeeded: u64,
    /// Points whose fetch failed.
    pub failed: u64,
    /// Records written to the sink, including partial batches.
    pub records: u64,
    /// Raw results skipped during normalization.
    pub malformed: u64,
    /// Result pages received.
    pub pages: u64,
}

/// Fetches every pending point of `store` and persists the results.
///
/// # Errors
///
/// Returns [`AcquisitionError`] if a batch, fault, or checkpoint cannot
/// be persisted. The failing point is left pending so a restart retries
/// it.
#[allow(clippy::future_not_send)]
pub async fn run<S, A, T, F>(
    store: &mut S,
    fetcher: &PlacesFetcher<A>,
    sink: &mut T,
    faults: &mut F,
    options: AcquisitionOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<AcquisitionSummary, AcquisitionError>
where
    S: JobStore,
    A: PlacesApi,
    T: TileSink,
    F: FaultSink,
{
    let pending = store.pending_count() as u64;
    let target = options.limit.map_or(pending, |limit| limit.min(pending));
    log::info!(
        "Acquisition: {pending} pending of {} points, processing {target}",
        store.entries().len()
    );
    progress.set_total(target);
    progress.set_position(0);

    let mut summary = AcquisitionSummary::default();
    let mut cursor = 0;

    while summary.processed < target {
        let Some(point) = store.next_pending(cursor).cloned() else {
            break;
        };
        cursor = point.index + 1;
        progress.set_message(format!("point {}", point.index));

        match fetcher
            .fetch(point.latitude, point.longitude, point.radius_meters)
            .await
        {
            FetchOutcome::Complete(pages) => {
                summary.succeeded += 1;
                summary.pages += pages.page_count() as u64;
                summary.malformed += pages.malformed();
                let records = pages.into_records();
                sink.write_batch(point.index, &records)?;
                summary.records += records.len() as u64;
                log::debug!("Point {}: {} records", point.index, records.len());
            }
            FetchOutcome::Failed { fault, partial } => {
                summary.failed += 1;
                log::warn!(
                    "Point {} (lat={}, lng={}, radius={}) failed: {fault}",
                    point.index,
                    point.latitude,
                    point.longitude,
                    point.radius_meters
                );

                let entry = FaultEntry {
                    index: point.index,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    radius_meters: point.radius_meters,
                    message: fault.to_string(),
                    at: Utc::now(),
                };
                faults
                    .record(&entry)
                    .map_err(|source| AcquisitionError::FaultLog {
                        index: point.index,
                        source,
                    })?;

                if partial.page_count() > 0 {
                    summary.pages += partial.page_count() as u64;
                    summary.malformed += partial.malformed();
                    let records = partial.into_records();
                    sink.write_batch(point.index, &records)?;
                    summary.records += records.len() as u64;
                    log::info!(
                        "Point {}: kept {} records from pages before the fault",
                        point.index,
                        records.len()
                    );
                }
            }
        }

        store.mark_done(point.index)?;
        summary.processed += 1;
        progress.inc(1);
    }

    progress.finish(format!(
        "{} points ({} failed), {} records",
        summary.processed, summary.failed, summary.records
    ));
    log::info!("Acquisition finished: {summary:?}");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use venue_map_places_models::SamplingPoint;

    use super::*;
    use crate::fetcher::test_support::{ScriptedApi, page, status_fault};
    use crate::job_store::InMemoryJobStore;
    use crate::progress::null_progress;
    use crate::sink::MemorySink;

    fn store(n: u64) -> InMemoryJobStore {
        InMemoryJobStore::new(
            (0..n)
                .map(|index| SamplingPoint {
                    index,
                    longitude: 2.35,
                    latitude: 48.85,
                    radius_meters: 250.0,
                    done: false,
                })
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn failed_points_are_logged_and_still_marked_done() {
        let mut store = store(3);
        let fetcher = PlacesFetcher::new(ScriptedApi::new(vec![
            page(&["a"], None),
            status_fault("OVER_QUERY_LIMIT"),
            page(&["b", "c"], None),
        ]));
        let mut sink = MemorySink::new();
        let mut faults = Vec::new();

        let summary = run(
            &mut store,
            &fetcher,
            &mut sink,
            &mut faults,
            AcquisitionOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.records, 3);
        assert_eq!(store.pending_count(), 0);

        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].index, 1);
        assert!(faults[0].message.contains("OVER_QUERY_LIMIT"));

        let indices: Vec<u64> = sink.batches().iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_stops_early_and_rerun_resumes() {
        let mut store = store(4);
        let fetcher = PlacesFetcher::new(ScriptedApi::new(vec![
            page(&["a"], None),
            page(&["b"], None),
            page(&["c"], None),
            page(&["d"], None),
        ]));
        let mut sink = MemorySink::new();
        let mut faults = Vec::new();

        let first = run(
            &mut store,
            &fetcher,
            &mut sink,
            &mut faults,
            AcquisitionOptions { limit: Some(2) },
            &null_progress(),
        )
        .await
        .unwrap();
        assert_eq!(first.processed, 2);
        let pending: Vec<u64> = store.pending_entries().map(|p| p.index).collect();
        assert_eq!(pending, vec![2, 3]);

        let second = run(
            &mut store,
            &fetcher,
            &mut sink,
            &mut faults,
            AcquisitionOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();
        assert_eq!(second.processed, 2);
        assert_eq!(fetcher.api().calls().len(), 4);
        assert_eq!(sink.len(), 4);
        assert_eq!(sink.batches()[3].records[0].id, "d");
    }

    #[tokio::test(start_paused = true)]
    async fn done_points_are_never_fetched() {
        let mut store = store(3);
        store.mark_done(0).unwrap();
        store.mark_done(2).unwrap();
        let fetcher = PlacesFetcher::new(ScriptedApi::new(vec![page(&["x"], None)]));
        let mut sink = MemorySink::new();
        let mut faults = Vec::new();

        let summary = run(
            &mut store,
            &fetcher,
            &mut sink,
            &mut faults,
            AcquisitionOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(fetcher.api().calls().len(), 1);
        assert_eq!(sink.batches()[0].index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_pages_are_persisted_on_fault() {
        let mut store = store(1);
        let fetcher = PlacesFetcher::new(ScriptedApi::new(vec![
            page(&["a", "b"], Some("t1")),
            status_fault("INVALID_REQUEST"),
        ]));
        let mut sink = MemorySink::new();
        let mut faults = Vec::new();

        let summary = run(
            &mut store,
            &fetcher,
            &mut sink,
            &mut faults,
            AcquisitionOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.records, 2);
        assert_eq!(sink.batches()[0].records.len(), 2);
        assert_eq!(faults.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_results_still_write_a_batch() {
        let mut store = store(1);
        let fetcher = PlacesFetcher::new(ScriptedApi::new(vec![page(&[], None)]));
        let mut sink = MemorySink::new();
        let mut faults = Vec::new();

        run(
            &mut store,
            &fetcher,
            &mut sink,
            &mut faults,
            AcquisitionOptions::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(sink.len(), 1);
        assert!(sink.batches()[0].records.is_empty());
    }
}
