//! Staggered grid generation.
//!
//! The grid is two square lattices of search circles. The primary lattice
//! starts at the south-west corner with a step of one diameter in each
//! axis; the secondary lattice is shifted by one radius in both axes so its
//! points sit in the gaps between primary circles. Adjacent circles of the
//! same lattice overlap by roughly 57%, which is what keeps venues from
//! slipping through in dense areas where a single search hits the
//! provider's result cap.

use venue_map_places_models::{BoundingRegion, SamplingPoint};

use crate::{GridError, validate_region};

/// Region-specific conversion between meters and degrees.
///
/// These are flat-earth factors measured around one latitude, not a
/// geodesic conversion. The defaults are valid near 48.86N.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeScale {
    /// Meters spanned by one degree of latitude.
    pub meters_per_degree_lat: f64,
    /// Meters spanned by one degree of longitude.
    pub meters_per_degree_lng: f64,
}

impl Default for DegreeScale {
    fn default() -> Self {
        Self {
            meters_per_degree_lat: 111_110.0,
            meters_per_degree_lng: 73_000.0,
        }
    }
}

impl DegreeScale {
    /// Converts a radius in meters to `(longitude, latitude)` deltas in
    /// degrees.
    #[must_use]
    pub fn radius_degrees(&self, radius_meters: f64) -> (f64, f64) {
        (
            radius_meters / self.meters_per_degree_lng,
            radius_meters / self.meters_per_degree_lat,
        )
    }

    fn validate(&self) -> Result<(), GridError> {
        for (label, value) in [
            ("meters_per_degree_lat", self.meters_per_degree_lat),
            ("meters_per_degree_lng", self.meters_per_degree_lng),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(GridError::InvalidScale {
                    message: format!("{label} must be positive, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Everything needed to tile a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Area to cover.
    pub region: BoundingRegion,
    /// Search radius of every point, in meters.
    pub radius_meters: f64,
    /// Meter/degree conversion for the region.
    pub scale: DegreeScale,
}

impl GridConfig {
    /// Creates a config using the default [`DegreeScale`].
    #[must_use]
    pub fn new(region: BoundingRegion, radius_meters: f64) -> Self {
        Self {
            region,
            radius_meters,
            scale: DegreeScale::default(),
        }
    }

    /// Replaces the degree scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: DegreeScale) -> Self {
        self.scale = scale;
        self
    }

    /// Validates region, radius, and scale.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] for the first invalid setting.
    pub fn validate(&self) -> Result<(), GridError> {
        validate_region(&self.region)?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(GridError::InvalidRadius {
                radius: self.radius_meters,
            });
        }
        self.scale.validate()
    }
}

/// Generates the staggered sampling grid for `config`.
///
/// Points are emitted primary lattice first, then secondary lattice, each
/// row by row from south to north and west to east within a row. Indices
/// start at 0 and increase by one per point.
///
/// Edge policy: the primary lattice includes points that land exactly on
/// the north or east edge (`<=`), the secondary lattice excludes them
/// (`<`), so no secondary point ever sits on the boundary.
///
/// # Errors
///
/// Returns [`GridError`] if the config fails validation.
pub fn generate_grid(config: &GridConfig) -> Result<Vec<SamplingPoint>, GridError> {
    config.validate()?;

    let region = &config.region;
    let (radius_lng, radius_lat) = config.scale.radius_degrees(config.radius_meters);
    let step_lng = 2.0 * radius_lng;
    let step_lat = 2.0 * radius_lat;

    let mut points = Vec::new();

    // Primary lattice, inclusive bounds.
    for_each_lattice_point(
        (region.west, region.south),
        (step_lng, step_lat),
        |lng, lat| lng <= region.east && lat <= region.north,
        |lng, lat| push_point(&mut points, lng, lat, config.radius_meters),
    );
    let primary = points.len();

    // Secondary lattice, shifted by one radius, exclusive bounds.
    for_each_lattice_point(
        (region.west + radius_lng, region.south + radius_lat),
        (step_lng, step_lat),
        |lng, lat| lng < region.east && lat < region.north,
        |lng, lat| push_point(&mut points, lng, lat, config.radius_meters),
    );

    log::debug!(
        "Generated {} sampling points ({primary} primary, {} secondary) at radius {}m",
        points.len(),
        points.len() - primary,
        config.radius_meters,
    );

    Ok(points)
}

/// Walks a lattice row by row. Coordinates are computed as
/// `origin + i * step` rather than by repeated addition so the lattice does
/// not drift on large regions.
fn for_each_lattice_point(
    origin: (f64, f64),
    step: (f64, f64),
    within: impl Fn(f64, f64) -> bool,
    mut emit: impl FnMut(f64, f64),
) {
    let (origin_lng, origin_lat) = origin;
    let (step_lng, step_lat) = step;

    let mut row = 0u32;
    loop {
        let lat = origin_lat + f64::from(row) * step_lat;
        if !within(origin_lng, lat) {
            break;
        }
        let mut col = 0u32;
        loop {
            let lng = origin_lng + f64::from(col) * step_lng;
            if !within(lng, lat) {
                break;
            }
            emit(lng, lat);
            col += 1;
        }
        row += 1;
    }
}

fn push_point(points: &mut Vec<SamplingPoint>, longitude: f64, latitude: f64, radius: f64) {
    points.push(SamplingPoint {
        index: points.len() as u64,
        longitude,
        latitude,
        radius_meters: radius,
        done: false,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> BoundingRegion {
        BoundingRegion::new(48.91, 2.47, 48.81, 2.22)
    }

    #[test]
    fn reproduces_reference_point_count() {
        let points = generate_grid(&GridConfig::new(paris(), 52.5)).unwrap();
        assert_eq!(points.len(), 36_888);
    }

    #[test]
    fn point_count_is_deterministic() {
        let config = GridConfig::new(paris(), 250.0);
        let first = generate_grid(&config).unwrap();
        let second = generate_grid(&config).unwrap();
        assert_eq!(first.len(), 1_643);
        assert_eq!(first, second);
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let points = generate_grid(&GridConfig::new(paris(), 400.0)).unwrap();
        for (i, point) in points.iter().enumerate() {
            assert_eq!(point.index, i as u64);
            assert!(!point.done);
        }
    }

    #[test]
    fn points_stay_within_region() {
        let region = paris();
        let points = generate_grid(&GridConfig::new(region, 300.0)).unwrap();
        for point in &points {
            assert!(point.longitude >= region.west && point.longitude <= region.east);
            assert!(point.latitude >= region.south && point.latitude <= region.north);
        }
    }

    #[test]
    fn primary_includes_edges_and_secondary_excludes_them() {
        // 73m at 73,000 m/degree is exactly 0.001 degrees of longitude, so
        // the primary lattice lands on the east edge (0.002) while the
        // secondary lattice would land on it at 0.003 and stops at 0.001.
        let region = BoundingRegion::new(0.002, 0.002, 0.0, 0.0);
        let points = generate_grid(&GridConfig::new(region, 73.0)).unwrap();
        assert_eq!(points.len(), 6);

        let primary = &points[..4];
        assert!(primary.iter().any(|p| (p.longitude - 0.002).abs() < 1e-12));

        let secondary = &points[4..];
        for point in secondary {
            assert!((point.longitude - 0.001).abs() < 1e-12);
            assert!(point.longitude < region.east && point.latitude < region.north);
        }
    }

    #[test]
    fn secondary_lattice_is_offset_by_one_radius() {
        let region = BoundingRegion::new(1.0, 1.0, 0.0, 0.0);
        let config = GridConfig::new(region, 18_250.0);
        let points = generate_grid(&config).unwrap();
        let (radius_lng, radius_lat) = config.scale.radius_degrees(18_250.0);
        let first_secondary = points
            .iter()
            .find(|p| p.longitude > 0.0 && p.latitude > 0.0 && p.latitude < 2.0 * radius_lat)
            .unwrap();
        assert!((first_secondary.longitude - radius_lng).abs() < 1e-12);
        assert!((first_secondary.latitude - radius_lat).abs() < 1e-12);
        assert_eq!(points.len(), 18);
    }

    #[test]
    fn custom_scale_changes_spacing() {
        let region = BoundingRegion::new(0.01, 0.01, 0.0, 0.0);
        let scale = DegreeScale {
            meters_per_degree_lat: 111_320.0,
            meters_per_degree_lng: 111_320.0,
        };
        let default_grid = generate_grid(&GridConfig::new(region, 100.0)).unwrap();
        let custom_grid =
            generate_grid(&GridConfig::new(region, 100.0).with_scale(scale)).unwrap();
        assert_ne!(default_grid.len(), custom_grid.len());
    }

    #[test]
    fn rejects_non_positive_radius() {
        for radius in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                generate_grid(&GridConfig::new(paris(), radius)),
                Err(GridError::InvalidRadius { .. })
            ));
        }
    }

    #[test]
    fn rejects_invalid_scale() {
        let scale = DegreeScale {
            meters_per_degree_lat: 0.0,
            meters_per_degree_lng: 73_000.0,
        };
        assert!(matches!(
            generate_grid(&GridConfig::new(paris(), 100.0).with_scale(scale)),
            Err(GridError::InvalidScale { .. })
        ));
    }
}
