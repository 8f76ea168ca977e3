//! Turns raw tile batches into a set of unique, attributed venues.
//!
//! Steps, applied in this order:
//!
//! 1. Flatten all batches. Records with an empty id or unusable
//!    coordinates are counted as malformed and dropped.
//! 2. Keep only venues: records tagged `point_of_interest` or
//!    `establishment`. Anything else is a street, a locality, or some
//!    other administrative feature.
//! 3. Deduplicate by id. Batches are walked in ascending point index and
//!    the last observation of an id wins.
//! 4. Keep records inside (or on the boundary of) the study area.
//! 5. Attribute each record to its enclosing district. Records that match
//!    no district or several are reported in the [`CleanReport`] and left
//!    out of the clean set.

use std::collections::BTreeMap;

use serde::Serialize;
use venue_map_acquisition::TileBatch;
use venue_map_places_models::{CleanPlace, RawPlaceRecord};
use venue_map_spatial::{DistrictIndex, DistrictMatch, StudyArea};

/// Type tags that mark a record as a venue.
pub const VENUE_TYPES: [&str; 2] = ["point_of_interest", "establishment"];

/// A place that falls inside several districts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousPlace {
    /// Place identifier.
    pub place_id: String,
    /// Candidate district identifiers, sorted.
    pub district_ids: Vec<String>,
}

/// Data-quality counts for one cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Records read from all batches.
    pub raw_records: u64,
    /// Records with an empty id or unusable coordinates.
    pub malformed: u64,
    /// Records without a venue type tag.
    pub non_venue: u64,
    /// Venue records dropped as repeat observations of the same id.
    pub duplicates: u64,
    /// Unique venues outside the study area.
    pub outside_study_area: u64,
    /// Ids of venues inside the study area that no district contains.
    pub unmatched: Vec<String>,
    /// Venues that several districts contain.
    pub multiple: Vec<AmbiguousPlace>,
    /// Size of the clean set.
    pub clean: u64,
}

impl CleanReport {
    /// Whether any record was lost to a district attribution fault.
    #[must_use]
    pub fn has_attribution_faults(&self) -> bool {
        !self.unmatched.is_empty() || !self.multiple.is_empty()
    }
}

/// Output of [`clean`].
#[derive(Debug, Clone, Default)]
pub struct CleanResult {
    /// Unique venues, sorted by id.
    pub places: Vec<CleanPlace>,
    /// What was dropped and why.
    pub report: CleanReport,
}

/// Whether the record carries at least one of the [`VENUE_TYPES`].
#[must_use]
pub fn is_venue(record: &RawPlaceRecord) -> bool {
    VENUE_TYPES.iter().any(|t| record.types.contains(*t))
}

fn is_well_formed(record: &RawPlaceRecord) -> bool {
    !record.id.trim().is_empty()
        && record.lat.is_finite()
        && record.lng.is_finite()
        && (-90.0..=90.0).contains(&record.lat)
        && (-180.0..=180.0).contains(&record.lng)
}

/// Cleans and attributes every record in `batches`.
///
/// The result does not depend on the order of `batches`: they are sorted
/// by point index before deduplication.
#[must_use]
pub fn clean(batches: &[TileBatch], study_area: &StudyArea, districts: &DistrictIndex) -> CleanResult {
    let mut report = CleanReport::default();

    let mut ordered: Vec<&TileBatch> = batches.iter().collect();
    ordered.sort_by_key(|b| b.index);

    let mut unique: BTreeMap<&str, &RawPlaceRecord> = BTreeMap::new();
    for record in ordered.iter().flat_map(|b| b.records.iter()) {
        report.raw_records += 1;

        if !is_well_formed(record) {
            report.malformed += 1;
            continue;
        }
        if !is_venue(record) {
            report.non_venue += 1;
            continue;
        }
        if unique.insert(record.id.as_str(), record).is_some() {
            report.duplicates += 1;
        }
    }

    let mut places = Vec::with_capacity(unique.len());
    for (id, record) in unique {
        if !study_area.covers(record.lng, record.lat) {
            report.outside_study_area += 1;
            continue;
        }

        match districts.lookup(record.lng, record.lat) {
            DistrictMatch::One(district) => places.push(CleanPlace {
                place: record.clone(),
                district_id: district.id.clone(),
            }),
            DistrictMatch::None => {
                log::warn!(
                    "Place {id} ({}, {}) is in no district",
                    record.lat,
                    record.lng
                );
                report.unmatched.push(id.to_string());
            }
            DistrictMatch::Many(candidates) => {
                let district_ids: Vec<String> =
                    candidates.iter().map(|d| d.id.clone()).collect();
                log::warn!("Place {id} is in several districts: {district_ids:?}");
                report.multiple.push(AmbiguousPlace {
                    place_id: id.to_string(),
                    district_ids,
                });
            }
        }
    }

    report.clean = places.len() as u64;
    log::info!(
        "Cleaned {} raw records into {} venues ({} duplicates, {} non-venue, {} outside, {} unattributed)",
        report.raw_records,
        report.clean,
        report.duplicates,
        report.non_venue,
        report.outside_study_area,
        report.unmatched.len() + report.multiple.len()
    );

    CleanResult { places, report }
}
