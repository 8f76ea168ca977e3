//! The study polygon bounding the analysis.

use std::path::Path;

use geo::{Intersects, MultiPolygon, Point};

use crate::{District, SpatialError, parse_geojson_to_multipolygon};

/// Outline of the area under study.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyArea {
    polygon: MultiPolygon<f64>,
}

impl StudyArea {
    /// Wraps an existing polygon.
    #[must_use]
    pub const fn new(polygon: MultiPolygon<f64>) -> Self {
        Self { polygon }
    }

    /// Reads the study polygon from a `GeoJSON` file (geometry, feature,
    /// or feature collection).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the file cannot be read or holds no
    /// polygon.
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let body = std::fs::read_to_string(path).map_err(|source| SpatialError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(parse_geojson_to_multipolygon(&body)?))
    }

    /// Uses the union of all district polygons as the study area.
    #[must_use]
    pub fn from_districts(districts: &[District]) -> Self {
        let polygons = districts
            .iter()
            .flat_map(|d| d.polygon.0.iter().cloned())
            .collect();
        Self::new(MultiPolygon(polygons))
    }

    /// The study polygon.
    #[must_use]
    pub const fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    /// Whether the point lies inside the study area or on its boundary.
    #[must_use]
    pub fn covers(&self, lng: f64, lat: f64) -> bool {
        self.polygon.intersects(&Point::new(lng, lat))
    }
}
