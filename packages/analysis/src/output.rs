//! Writers for the analysis outputs consumed by the visualization layer.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry};
use serde::Serialize;
use venue_map_places_models::{CleanPlace, DensityMetric};
use venue_map_spatial::District;

use crate::AnalysisError;
use crate::clean::CleanReport;

/// Flat CSV row for a clean place.
#[derive(Serialize)]
struct PlaceRow<'a> {
    id: &'a str,
    name: &'a str,
    lat: f64,
    lng: f64,
    price_level: Option<u8>,
    rating: Option<f64>,
    rating_count: Option<u64>,
    types: String,
    district_id: &'a str,
}

impl<'a> From<&'a CleanPlace> for PlaceRow<'a> {
    fn from(clean: &'a CleanPlace) -> Self {
        let place = &clean.place;
        Self {
            id: &place.id,
            name: &place.name,
            lat: place.lat,
            lng: place.lng,
            price_level: place.price_level,
            rating: place.rating,
            rating_count: place.rating_count,
            types: place.types.iter().map(String::as_str).collect::<Vec<_>>().join(";"),
            district_id: &clean.district_id,
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, AnalysisError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| AnalysisError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| AnalysisError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

fn finish(mut writer: BufWriter<File>, path: &Path) -> Result<(), AnalysisError> {
    writer.flush().map_err(|source| AnalysisError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Writes clean places as CSV. Type tags are joined with `;`.
///
/// # Errors
///
/// Returns [`AnalysisError`] if the file cannot be written.
pub fn write_places_csv(path: &Path, places: &[CleanPlace]) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for place in places {
        writer.serialize(PlaceRow::from(place))?;
    }
    writer.flush().map_err(|source| AnalysisError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::info!("Wrote {} places to {}", places.len(), path.display());
    Ok(())
}

/// Writes density metrics as CSV.
///
/// # Errors
///
/// Returns [`AnalysisError`] if the file cannot be written.
pub fn write_metrics_csv(path: &Path, metrics: &[DensityMetric]) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for metric in metrics {
        writer.serialize(metric)?;
    }
    writer.flush().map_err(|source| AnalysisError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::info!("Wrote {} district metrics to {}", metrics.len(), path.display());
    Ok(())
}

/// Builds a feature collection of district polygons carrying their
/// metrics as properties. Metrics without a matching district are
/// skipped.
///
/// # Errors
///
/// Returns [`AnalysisError::Json`] if a metric cannot be converted to
/// properties.
pub fn metrics_feature_collection(
    metrics: &[DensityMetric],
    districts: &[District],
) -> Result<FeatureCollection, AnalysisError> {
    let mut features = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let Some(district) = districts.iter().find(|d| d.id == metric.district_id) else {
            log::warn!("No polygon for district {}", metric.district_id);
            continue;
        };

        let serde_json::Value::Object(properties) = serde_json::to_value(metric)? else {
            continue;
        };

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&district.polygon))),
            id: Some(geojson::feature::Id::String(district.id.clone())),
            properties: Some(properties),
            foreign_members: None,
        });
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Writes the metrics feature collection as `GeoJSON`.
///
/// # Errors
///
/// Returns [`AnalysisError`] if the file cannot be written.
pub fn write_metrics_geojson(
    path: &Path,
    metrics: &[DensityMetric],
    districts: &[District],
) -> Result<(), AnalysisError> {
    let collection = metrics_feature_collection(metrics, districts)?;
    let mut writer = create(path)?;
    serde_json::to_writer(&mut writer, &collection)?;
    finish(writer, path)?;
    log::info!(
        "Wrote {} district features to {}",
        collection.features.len(),
        path.display()
    );
    Ok(())
}

/// Writes the cleaning report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`AnalysisError`] if the file cannot be written.
pub fn write_report(path: &Path, report: &CleanReport) -> Result<(), AnalysisError> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, report)?;
    finish(writer, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{district, record};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "venue_map_output_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn places_csv_has_one_row_per_place() {
        let dir = temp_dir("places");
        let path = dir.join("generated/places.csv");
        let places = vec![
            CleanPlace {
                place: record("a", 0.5, 0.5),
                district_id: "a".to_string(),
            },
            CleanPlace {
                place: record("b", 1.5, 0.5),
                district_id: "b".to_string(),
            },
        ];

        write_places_csv(&path, &places).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "id,name,lat,lng,price_level,rating,rating_count,types,district_id"
        );
        assert!(lines[1].contains("establishment;point_of_interest;restaurant"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn geojson_carries_metric_properties() {
        let districts = vec![district("a", 1_000_000.0)];
        let metrics = crate::aggregate::aggregate(&[], &districts);

        let collection = metrics_feature_collection(&metrics, &districts).unwrap();
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert!(feature.geometry.is_some());
        assert_eq!(
            feature.property("districtId"),
            Some(&serde_json::Value::String("a".to_string()))
        );
        assert_eq!(feature.property("count"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn report_round_trips_through_json() {
        let dir = temp_dir("report");
        let path = dir.join("report.json");
        let report = CleanReport {
            raw_records: 3,
            unmatched: vec!["x".to_string()],
            ..CleanReport::default()
        };

        write_report(&path, &report).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["raw_records"], 3);
        assert_eq!(value["unmatched"][0], "x");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
