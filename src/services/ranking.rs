//! Distance ranking of candidate locations.
//!
//! Pure and synchronous: the same inputs always produce the same output, so a ranking can
//! be recomputed whenever the position or the candidate set changes.

use crate::models::{CandidateLocation, Coordinates, Distance, Position, RankedLocation};
use std::cmp::Ordering;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distances at or above this are labeled in kilometers
const KILOMETER_LABEL_THRESHOLD_M: f64 = 1000.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Great-circle distance between two points in meters (haversine formula).
pub fn haversine_m(from: Coordinates, to: Coordinates) -> f64 {
    let lat1_rad = from.lat * DEG_TO_RAD;
    let lat2_rad = to.lat * DEG_TO_RAD;
    let delta_lat = (to.lat - from.lat) * DEG_TO_RAD;
    let delta_lng = (to.lng - from.lng) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Human-readable distance: `"850 m"` below a kilometer, `"1.2 km"` from there on.
pub fn format_distance(meters: f64) -> String {
    if meters < KILOMETER_LABEL_THRESHOLD_M {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

/// Rank candidates by distance from `position`.
///
/// - With no position, the candidates come back in input order without distances; the
///   caller presents them as "distance unknown".
/// - Otherwise every candidate with coordinates gets a distance and label, and the list is
///   sorted nearest first. Candidates without coordinates keep their relative input order
///   at the end.
pub fn rank(locations: &[CandidateLocation], position: Option<&Position>) -> Vec<RankedLocation> {
    let Some(position) = position else {
        return locations
            .iter()
            .cloned()
            .map(|location| RankedLocation {
                location,
                distance: None,
            })
            .collect();
    };

    let origin = Coordinates {
        lat: position.lat,
        lng: position.lng,
    };

    let mut ranked: Vec<RankedLocation> = locations
        .iter()
        .cloned()
        .map(|location| {
            let distance = location.coordinates.map(|coords| {
                let meters = haversine_m(origin, coords);
                Distance {
                    meters,
                    label: format_distance(meters),
                }
            });
            RankedLocation { location, distance }
        })
        .collect();

    // Vec::sort_by is stable, which keeps ties and unresolvable entries in input order
    ranked.sort_by(|a, b| match (a.distance_meters(), b.distance_meters()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    ranked
}
