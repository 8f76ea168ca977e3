//! District boundary loading.
//!
//! Districts come from a `GeoJSON` `FeatureCollection` (one feature per
//! district). A [`DistrictFieldMapping`] names the properties holding the
//! identifier, name, arrondissement, and surface area, so exports with
//! different column naming can be used without code changes.

use std::path::Path;

use geo::{ChamberlainDuquetteArea, MultiPolygon};
use geojson::{Feature, GeoJson};
use venue_map_places_models::study::DistrictSettings;

use crate::{SpatialError, geometry_to_multipolygon};

/// A district polygon with its reference attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct District {
    /// District identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Arrondissement (administrative parent).
    pub arrondissement: String,
    /// Surface area in square meters.
    pub surface_area_sq_m: f64,
    /// Boundary polygon (WGS84).
    pub polygon: MultiPolygon<f64>,
}

/// Property names used to read district attributes from `GeoJSON`
/// features.
#[derive(Debug, Clone)]
pub struct DistrictFieldMapping {
    /// Property containing the district identifier.
    pub id: String,
    /// Property containing the district name.
    pub name: String,
    /// Property containing the arrondissement.
    pub arrondissement: String,
    /// Property containing the surface area in square meters. When
    /// `None` (or missing on a feature) the area is computed from the
    /// polygon.
    pub surface_area: Option<String>,
}

impl From<&DistrictSettings> for DistrictFieldMapping {
    fn from(settings: &DistrictSettings) -> Self {
        Self {
            id: settings.id_field.clone(),
            name: settings.name_field.clone(),
            arrondissement: settings.arrondissement_field.clone(),
            surface_area: settings.surface_field.clone(),
        }
    }
}

/// Reads and parses a district `GeoJSON` file.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be read or parsed, or if
/// any district is missing its identifier or geometry.
pub fn load_districts(
    path: &Path,
    fields: &DistrictFieldMapping,
) -> Result<Vec<District>, SpatialError> {
    let body = std::fs::read_to_string(path).map_err(|source| SpatialError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let districts = parse_districts(&body, fields)?;
    log::info!(
        "Loaded {} districts from {}",
        districts.len(),
        path.display()
    );
    Ok(districts)
}

/// Parses districts from a `GeoJSON` `FeatureCollection` string.
///
/// Unlike place records, reference data is all-or-nothing: a feature
/// without an identifier or polygon fails the whole load, since a missing
/// district would silently distort every density figure.
///
/// # Errors
///
/// Returns [`SpatialError`] on invalid `GeoJSON`, duplicate identifiers,
/// or features missing required attributes.
pub fn parse_districts(
    geojson_str: &str,
    fields: &DistrictFieldMapping,
) -> Result<Vec<District>, SpatialError> {
    let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
        return Err(SpatialError::Conversion {
            message: "district file must be a FeatureCollection".to_string(),
        });
    };

    let mut districts = Vec::with_capacity(collection.features.len());
    for (position, feature) in collection.features.into_iter().enumerate() {
        districts.push(parse_feature(position, feature, fields)?);
    }

    let mut ids: Vec<&str> = districts.iter().map(|d| d.id.as_str()).collect();
    ids.sort_unstable();
    if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
        return Err(SpatialError::Conversion {
            message: format!("duplicate district id: {}", pair[0]),
        });
    }

    Ok(districts)
}

fn parse_feature(
    position: usize,
    feature: Feature,
    fields: &DistrictFieldMapping,
) -> Result<District, SpatialError> {
    let id = property_text(&feature, &fields.id).ok_or_else(|| SpatialError::Conversion {
        message: format!("feature {position} has no '{}' property", fields.id),
    })?;
    let name = property_text(&feature, &fields.name).unwrap_or_else(|| id.clone());
    let arrondissement = property_text(&feature, &fields.arrondissement).unwrap_or_default();
    let declared_area = fields
        .surface_area
        .as_deref()
        .and_then(|field| property_number(&feature, field));

    let geometry = feature.geometry.ok_or_else(|| SpatialError::Conversion {
        message: format!("district {id} has no geometry"),
    })?;
    let polygon = geometry_to_multipolygon(geometry)?;

    let surface_area_sq_m = match declared_area {
        Some(area) if area > 0.0 => area,
        _ => {
            let computed = polygon.chamberlain_duquette_unsigned_area();
            log::debug!("District {id}: no surface property, computed {computed:.0} m2");
            computed
        }
    };

    Ok(District {
        id,
        name,
        arrondissement,
        surface_area_sq_m,
        polygon,
    })
}

/// Reads a property as trimmed text. Numeric properties are formatted, so
/// integer codes like `"c_qu": 12` become `"12"`.
fn property_text(feature: &Feature, key: &str) -> Option<String> {
    let text = match feature.property(key)? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map_or_else(|| n.to_string(), |i| i.to_string()),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn property_number(feature: &Feature, key: &str) -> Option<f64> {
    let value: f64 = match feature.property(key)? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
