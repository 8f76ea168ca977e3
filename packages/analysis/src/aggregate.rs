//! Per-district venue statistics.

use std::collections::BTreeMap;

use venue_map_places_models::{CleanPlace, DensityMetric};
use venue_map_spatial::District;

/// Square meters per square kilometer.
pub const SQ_M_PER_SQ_KM: f64 = 1_000_000.0;

#[derive(Default)]
struct Accumulator {
    count: u64,
    rating_sum: f64,
    rated: u64,
    rating_count: u64,
    price_sum: f64,
    priced: u64,
}

impl Accumulator {
    fn add(&mut self, place: &CleanPlace) {
        self.count += 1;
        if let Some(rating) = place.place.rating {
            self.rating_sum += rating;
            self.rated += 1;
        }
        self.rating_count += place.place.rating_count.unwrap_or(0);
        if let Some(price) = place.place.price_level {
            self.price_sum += f64::from(price);
            self.priced += 1;
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, n: u64) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}

/// Places per square kilometer. A district with no usable area gets 0.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn density_per_sq_km(count: u64, surface_area_sq_m: f64) -> f64 {
    if surface_area_sq_m > 0.0 {
        SQ_M_PER_SQ_KM * count as f64 / surface_area_sq_m
    } else {
        0.0
    }
}

/// Computes one [`DensityMetric`] per district, in district order.
///
/// Districts without places still appear, with a zero count and density
/// and no mean rating. Places whose district id is unknown are ignored
/// (with a warning).
#[must_use]
pub fn aggregate(places: &[CleanPlace], districts: &[District]) -> Vec<DensityMetric> {
    let mut totals: BTreeMap<&str, Accumulator> = districts
        .iter()
        .map(|d| (d.id.as_str(), Accumulator::default()))
        .collect();

    for place in places {
        match totals.get_mut(place.district_id.as_str()) {
            Some(acc) => acc.add(place),
            None => log::warn!(
                "Place {} references unknown district {}",
                place.place.id,
                place.district_id
            ),
        }
    }

    districts
        .iter()
        .map(|district| {
            let acc = totals.remove(district.id.as_str()).unwrap_or_default();
            if district.surface_area_sq_m <= 0.0 {
                log::warn!("District {} has no surface area", district.id);
            }
            DensityMetric {
                district_id: district.id.clone(),
                district_name: district.name.clone(),
                arrondissement: district.arrondissement.clone(),
                count: acc.count,
                mean_rating: mean(acc.rating_sum, acc.rated),
                total_rating_count: acc.rating_count,
                mean_price_level: mean(acc.price_sum, acc.priced),
                surface_area_sq_m: district.surface_area_sq_m,
                density_per_sq_km: density_per_sq_km(acc.count, district.surface_area_sq_m),
            }
        })
        .collect()
}
