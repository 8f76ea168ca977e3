#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Sampling grid generation for bulk place acquisition.
//!
//! [`generate::generate_grid`] tiles a [`BoundingRegion`] with two
//! interleaved square lattices of search circles, [`area::filter_to_region`]
//! clips the result to an arbitrary polygon, and [`budget`] turns the point
//! count into an API call estimate.

pub mod area;
pub mod budget;
pub mod generate;

pub use area::filter_to_region;
pub use generate::{DegreeScale, GridConfig, generate_grid};

use venue_map_places_models::BoundingRegion;

/// Configuration faults detected before any API call is issued.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The bounding region is inverted, empty, or not finite.
    #[error("Invalid region: {message}")]
    InvalidRegion {
        /// Description of what is wrong with the region.
        message: String,
    },

    /// The sampling radius is not a positive finite number.
    #[error("Invalid radius: {radius} (must be a positive number of meters)")]
    InvalidRadius {
        /// The rejected radius.
        radius: f64,
    },

    /// The degree-to-meter conversion factors are unusable.
    #[error("Invalid degree scale: {message}")]
    InvalidScale {
        /// Description of what is wrong with the scale.
        message: String,
    },

    /// The grid needs more calls than the configured budget allows.
    #[error("Grid needs at least {required} API calls but the budget is {budget}")]
    OverBudget {
        /// Minimum number of calls the grid requires.
        required: u64,
        /// Configured call budget.
        budget: u64,
    },
}

/// Checks that `region` is finite with `north > south` and `east > west`.
///
/// # Errors
///
/// Returns [`GridError::InvalidRegion`] describing the first violated
/// constraint.
pub fn validate_region(region: &BoundingRegion) -> Result<(), GridError> {
    let edges = [region.north, region.south, region.east, region.west];
    if edges.iter().any(|v| !v.is_finite()) {
        return Err(GridError::InvalidRegion {
            message: format!("edges must be finite numbers, got {region:?}"),
        });
    }
    if region.north <= region.south {
        return Err(GridError::InvalidRegion {
            message: format!(
                "north ({}) must be greater than south ({})",
                region.north, region.south
            ),
        });
    }
    if region.east <= region.west {
        return Err(GridError::InvalidRegion {
            message: format!(
                "east ({}) must be greater than west ({})",
                region.east, region.west
            ),
        });
    }
    if region.north > 90.0 || region.south < -90.0 {
        return Err(GridError::InvalidRegion {
            message: "latitudes must lie within [-90, 90]".to_string(),
        });
    }
    if region.east > 180.0 || region.west < -180.0 {
        return Err(GridError::InvalidRegion {
            message: "longitudes must lie within [-180, 180]".to_string(),
        });
    }
    Ok(())
}
