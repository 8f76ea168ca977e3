#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Place, sampling point, and density metric types.
//!
//! Every stage of the venue pipeline (grid generation, acquisition,
//! cleaning, aggregation) exchanges the plain serde types defined here.
//! The TOML schema for a study definition lives in [`study`].

pub mod study;

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A latitude/longitude bounding box in decimal degrees.
///
/// A valid region has `north > south` and `east > west`. Validation is
/// performed by the grid generator before any point is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    /// Northern edge (maximum latitude).
    pub north: f64,
    /// Southern edge (minimum latitude).
    pub south: f64,
    /// Eastern edge (maximum longitude).
    pub east: f64,
    /// Western edge (minimum longitude).
    pub west: f64,
}

impl BoundingRegion {
    /// Creates a region from its four edges, in `north, east, south, west`
    /// order.
    #[must_use]
    pub const fn new(north: f64, east: f64, south: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }
}

/// One grid location at which a search circle is queried.
///
/// Identity is [`SamplingPoint::index`]. The `done` flag is the only field
/// that changes after generation and is flipped by the acquisition loop.
/// Field names and order match the checkpoint table columns
/// (`index, longitude, latitude, radius, done`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingPoint {
    /// Unique, generation-ordered index.
    pub index: u64,
    /// Longitude of the circle center (WGS84).
    pub longitude: f64,
    /// Latitude of the circle center (WGS84).
    pub latitude: f64,
    /// Search radius in meters.
    #[serde(rename = "radius")]
    pub radius_meters: f64,
    /// Whether this point has already been processed.
    #[serde(deserialize_with = "deserialize_flag")]
    pub done: bool,
}

/// Accepts `true`/`false` in any letter case as well as `1`/`0`, so
/// checkpoints written by other tools can be resumed.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(n) => Err(serde::de::Error::custom(format!(
            "invalid done flag: {n}"
        ))),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid done flag: {other}"
            ))),
        },
    }
}

/// A place as returned by the search API, restricted to the fields the
/// pipeline uses.
///
/// The same place can appear in several tile batches because adjacent
/// search circles overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlaceRecord {
    /// Stable external identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Price level on the provider's 0-4 scale.
    pub price_level: Option<u8>,
    /// Average user rating (1.0-5.0).
    pub rating: Option<f64>,
    /// Number of user ratings.
    pub rating_count: Option<u64>,
    /// Provider type tags (e.g. `"restaurant"`, `"establishment"`).
    #[serde(default)]
    pub types: BTreeSet<String>,
}

/// A deduplicated venue inside the study area, attributed to exactly one
/// district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanPlace {
    /// The underlying place observation.
    pub place: RawPlaceRecord,
    /// Identifier of the enclosing district.
    pub district_id: String,
}

/// Per-district venue statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityMetric {
    /// District identifier.
    pub district_id: String,
    /// District display name.
    pub district_name: String,
    /// Arrondissement (administrative parent) of the district.
    pub arrondissement: String,
    /// Number of clean places in the district.
    pub count: u64,
    /// Mean rating over places that have one. `None` when no place in the
    /// district is rated.
    pub mean_rating: Option<f64>,
    /// Sum of rating counts over the district's places.
    pub total_rating_count: u64,
    /// Mean price level over places that have one.
    pub mean_price_level: Option<f64>,
    /// District surface area in square meters.
    pub surface_area_sq_m: f64,
    /// Places per square kilometer.
    pub density_per_sq_km: f64,
}

/// Response status reported by the places search API.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiStatus {
    /// At least one result was returned.
    Ok,
    /// The search succeeded but matched nothing.
    ZeroResults,
    /// Malformed request, or a page token used before it became valid.
    InvalidRequest,
    /// Quota or rate limit exceeded.
    OverQueryLimit,
    /// The key is missing, invalid, or not authorized.
    RequestDenied,
    /// Server-side error.
    UnknownError,
    /// The referenced location or token was not found.
    NotFound,
}

impl ApiStatus {
    /// Whether the status carries a usable (possibly empty) result page.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::ZeroResults)
    }
}
