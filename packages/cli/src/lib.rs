#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line driver for the venue map pipeline.
//!
//! A study file names the region, grid, API, and district settings;
//! [`pipeline`] turns it into a plan, a checkpoint, fetched tiles, and
//! finally per-district density outputs.

pub mod config;
pub mod interactive;
pub mod paths;
pub mod pipeline;

use std::sync::Arc;

use venue_map_acquisition::{AcquisitionSummary, ProgressCallback};
use venue_map_analysis::CleanReport;
use venue_map_places_models::study::StudyConfig;

use crate::paths::StudyPaths;
use crate::pipeline::{GridPlan, PipelineError, StatusReport};

/// Prints a grid plan with its budget verdict.
pub fn print_plan(study: &StudyConfig, plan: &GridPlan) {
    println!("Study:            {} ({})", study.name, study.id);
    println!("Radius:           {} m", study.grid.radius_meters);
    println!("Generated points: {}", plan.generated);
    println!("Points to fetch:  {}", plan.estimate.points);
    println!(
        "API calls:        {} to {}",
        plan.estimate.min_calls, plan.estimate.max_calls
    );
    match study.api.call_budget {
        Some(budget) if plan.estimate.min_calls > budget => {
            println!("Budget:           {budget} (EXCEEDED)");
        }
        Some(budget) if plan.estimate.max_calls > budget => {
            println!("Budget:           {budget} (worst case exceeds it)");
        }
        Some(budget) => println!("Budget:           {budget} (ok)"),
        None => println!("Budget:           none"),
    }
}

/// Prints checkpoint progress.
pub fn print_status(report: Option<&StatusReport>) {
    let Some(report) = report else {
        println!("No checkpoint yet. Run `init` or `fetch` first.");
        return;
    };
    println!("Points:  {}", report.total);
    println!("Done:    {}", report.done);
    println!("Pending: {}", report.pending);
    println!("Tiles:   {}", report.tiles);
    println!("Faults:  {}", report.faults);
}

/// Prints an acquisition summary.
pub fn print_summary(summary: &AcquisitionSummary) {
    println!(
        "Processed {} points: {} ok, {} failed; {} records over {} pages ({} malformed skipped)",
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.records,
        summary.pages,
        summary.malformed
    );
}

/// Prints the cleaning report.
pub fn print_report(report: &CleanReport) {
    println!("Raw records:         {}", report.raw_records);
    println!("Malformed:           {}", report.malformed);
    println!("Non-venue:           {}", report.non_venue);
    println!("Duplicates:          {}", report.duplicates);
    println!("Outside study area:  {}", report.outside_study_area);
    println!("No district:         {}", report.unmatched.len());
    println!("Several districts:   {}", report.multiple.len());
    println!("Clean venues:        {}", report.clean);
}

/// Runs acquisition and prints the summary.
///
/// # Errors
///
/// Returns [`PipelineError`] if acquisition cannot start or persist.
#[allow(clippy::future_not_send)]
pub async fn run_fetch(
    study: &StudyConfig,
    paths: &StudyPaths,
    limit: Option<u64>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(), PipelineError> {
    let summary = pipeline::fetch(study, paths, limit, progress).await?;
    print_summary(&summary);
    Ok(())
}

/// Runs the analysis and prints the report.
///
/// # Errors
///
/// Returns [`PipelineError`] if inputs cannot be read or outputs written.
pub fn run_analyze(study: &StudyConfig, paths: &StudyPaths) -> Result<(), PipelineError> {
    let analysis = pipeline::analyze(study, paths)?;
    print_report(&analysis.cleaned.report);
    println!(
        "Wrote {} district metrics to {}",
        analysis.metrics.len(),
        paths.generated_dir().display()
    );
    Ok(())
}
