//! TOML schema for a study definition.
//!
//! A study names the bounding region to tile, the sampling radius, the
//! search API settings, and the district reference data used for
//! aggregation. One study file drives every CLI subcommand.

use serde::{Deserialize, Serialize};

use crate::BoundingRegion;

/// A complete study definition, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Unique study identifier (e.g. `"paris"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Directory holding the checkpoint, tile files, fault log, and
    /// generated outputs.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Area to tile with sampling points.
    pub region: BoundingRegion,
    /// Grid settings.
    pub grid: GridSettings,
    /// Search API settings.
    pub api: ApiSettings,
    /// District reference data settings.
    pub districts: DistrictSettings,
}

/// Sampling grid settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Search radius for every sampling point, in meters.
    pub radius_meters: f64,
    /// Meters spanned by one degree of latitude in the study area.
    #[serde(default = "default_meters_per_degree_lat")]
    pub meters_per_degree_lat: f64,
    /// Meters spanned by one degree of longitude in the study area.
    /// Only valid near the study latitude.
    #[serde(default = "default_meters_per_degree_lng")]
    pub meters_per_degree_lng: f64,
    /// Drop grid points that fall outside the study polygon.
    #[serde(default = "default_true")]
    pub clip_to_study_area: bool,
}

/// Places search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Nearby-search endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Restrict results to a single place type (e.g. `"restaurant"`).
    pub place_type: Option<String>,
    /// Free-text keyword filter.
    pub keyword: Option<String>,
    /// Result language code.
    pub language: Option<String>,
    /// Seconds to wait before a continuation token may be used.
    #[serde(default = "default_page_delay_secs")]
    pub page_delay_secs: u64,
    /// Maximum pages requested per sampling point.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on API calls for the whole run.
    pub call_budget: Option<u64>,
}

/// District boundary reference data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictSettings {
    /// `GeoJSON` `FeatureCollection` with one feature per district.
    pub path: String,
    /// Property holding the district identifier.
    pub id_field: String,
    /// Property holding the district name.
    pub name_field: String,
    /// Property holding the arrondissement.
    pub arrondissement_field: String,
    /// Property holding the surface area in square meters. When absent,
    /// the area is computed from the polygon.
    pub surface_field: Option<String>,
    /// Optional `GeoJSON` file with the study polygon. Defaults to the
    /// union of all districts.
    pub study_area: Option<String>,
}

fn default_data_dir() -> String {
    "data".to_string()
}

const fn default_meters_per_degree_lat() -> f64 {
    111_110.0
}

const fn default_meters_per_degree_lng() -> f64 {
    73_000.0
}

const fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json".to_string()
}

fn default_api_key_env() -> String {
    "PLACES_API_KEY".to_string()
}

const fn default_page_delay_secs() -> u64 {
    10
}

const fn default_max_pages() -> u32 {
    3
}

const fn default_timeout_secs() -> u64 {
    30
}
