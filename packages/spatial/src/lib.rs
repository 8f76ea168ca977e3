#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! District reference data and spatial attribution.
//!
//! Loads district polygons from a `GeoJSON` export, builds an R-tree over
//! their envelopes, and answers point-in-polygon lookups for the cleaning
//! stage. Also provides the [`StudyArea`] polygon that bounds the whole
//! analysis.

pub mod district;
pub mod study_area;

pub use district::{District, DistrictFieldMapping, load_districts, parse_districts};
pub use study_area::StudyArea;

use geo::{Contains, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

/// Errors that can occur while loading reference geometry.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// Reading a geometry file failed.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The `GeoJSON` is valid but does not describe what was expected.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// A district polygon stored in the R-tree, pointing back into the
/// district list.
struct DistrictEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for DistrictEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Result of attributing a point to districts.
#[derive(Debug, PartialEq)]
pub enum DistrictMatch<'a> {
    /// No district contains the point.
    None,
    /// Exactly one district contains the point.
    One(&'a District),
    /// Several districts contain the point (overlapping polygons).
    Many(Vec<&'a District>),
}

/// R-tree index over a fixed set of districts.
pub struct DistrictIndex {
    districts: Vec<District>,
    tree: RTree<DistrictEntry>,
}

impl DistrictIndex {
    /// Builds the index. The districts are kept in the given order.
    #[must_use]
    pub fn new(districts: Vec<District>) -> Self {
        let entries = districts
            .iter()
            .enumerate()
            .map(|(position, d)| DistrictEntry {
                position,
                envelope: compute_envelope(&d.polygon),
            })
            .collect();

        let tree = RTree::bulk_load(entries);
        log::info!("Loaded {} districts into spatial index", districts.len());

        Self { districts, tree }
    }

    /// All indexed districts, in load order.
    #[must_use]
    pub fn districts(&self) -> &[District] {
        &self.districts
    }

    /// Finds every district whose polygon strictly contains the point.
    ///
    /// Uses [`geo::Contains`], so a point lying exactly on a district
    /// border matches neither side and comes back as
    /// [`DistrictMatch::None`].
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64) -> DistrictMatch<'_> {
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        let mut hits: Vec<&District> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| &self.districts[entry.position])
            .filter(|d| d.polygon.contains(&point))
            .collect();

        match hits.len() {
            0 => DistrictMatch::None,
            1 => DistrictMatch::One(hits.remove(0)),
            _ => {
                hits.sort_by(|a, b| a.id.cmp(&b.id));
                DistrictMatch::Many(hits)
            }
        }
    }
}

/// Parse a `GeoJSON` document into a single [`MultiPolygon`].
///
/// Accepts a bare `Polygon`/`MultiPolygon` geometry, a `Feature` holding
/// one, or a `FeatureCollection` whose polygons are merged.
pub(crate) fn parse_geojson_to_multipolygon(
    geojson_str: &str,
) -> Result<MultiPolygon<f64>, SpatialError> {
    let geojson: GeoJson = geojson_str.parse()?;
    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::Geometry(geom) => vec![geom],
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geom in geometries {
        polygons.extend(geometry_to_multipolygon(geom)?.0);
    }

    if polygons.is_empty() {
        return Err(SpatialError::Conversion {
            message: "GeoJSON contains no polygon geometry".to_string(),
        });
    }

    Ok(MultiPolygon(polygons))
}

/// Converts one `GeoJSON` geometry into a [`MultiPolygon`].
pub(crate) fn geometry_to_multipolygon(
    geom: geojson::Geometry,
) -> Result<MultiPolygon<f64>, SpatialError> {
    let geo_geom: geo::Geometry<f64> =
        geom.try_into().map_err(|e: geojson::Error| SpatialError::Conversion {
            message: format!("unsupported geometry: {e}"),
        })?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        other => Err(SpatialError::Conversion {
            message: format!("expected Polygon or MultiPolygon, got {other:?}"),
        }),
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
