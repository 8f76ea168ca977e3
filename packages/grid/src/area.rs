//! Clipping a sampling grid to the study polygon.
//!
//! The bounding box used for generation usually over-covers the study
//! area. Dropping the points whose center falls outside the polygon saves
//! API calls without losing coverage, since a point's circle only matters
//! if its center is inside.

use geo::{Intersects, MultiPolygon, Point};
use venue_map_places_models::SamplingPoint;

/// Returns the points whose center lies inside `polygon` or on its
/// boundary.
///
/// Uses [`geo::Intersects`], so a point exactly on an edge or vertex is
/// kept. Input order and indices are preserved; the surviving indices are
/// not renumbered, which keeps them stable across re-runs with the same
/// grid.
#[must_use]
pub fn filter_to_region(points: &[SamplingPoint], polygon: &MultiPolygon<f64>) -> Vec<SamplingPoint> {
    let kept: Vec<SamplingPoint> = points
        .iter()
        .filter(|p| polygon.intersects(&Point::new(p.longitude, p.latitude)))
        .cloned()
        .collect();

    log::debug!(
        "Clipped grid to study area: kept {} of {} points",
        kept.len(),
        points.len()
    );

    kept
}
