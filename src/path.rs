//! Geometry extraction and path densification.
//!
//! The routing service returns geometry as arbitrarily nested JSON arrays
//! whose coordinate leaves are `[lon, lat]` pairs. This module flattens that
//! structure, collapses adjacent duplicate coordinates, inserts evenly-spaced
//! interpolated points so no gap exceeds a threshold, and annotates every
//! point except the last with a heading toward its successor.
//!
//! Densification intentionally works in planar coordinate-degree units, the
//! same units as the threshold; great-circle distance only enters later, at
//! matching time.

use serde_json::Value;

use crate::PathPoint;

/// Maximum planar gap, in coordinate degrees, between consecutive points of
/// a densified path.
pub const DEFAULT_DENSIFY_THRESHOLD: f64 = 0.0001;

/// Flatten nested route geometry into `[lon, lat]` pairs.
///
/// Walks nested arrays depth-first and collects every leaf array of exactly
/// two numeric values, preserving traversal order. Non-array leaves are
/// ignored. Arrays that bottom out without forming a coordinate pair are
/// counted in the returned skip tally rather than raising.
///
/// # Example
/// ```
/// use roadview::extract_coordinates;
/// use serde_json::json;
///
/// let geometry = json!([[[126.9, 37.5], [126.91, 37.51]], [126.92, 37.52]]);
/// let (coords, skipped) = extract_coordinates(&geometry);
/// assert_eq!(coords.len(), 3);
/// assert_eq!(skipped, 0);
/// ```
pub fn extract_coordinates(value: &Value) -> (Vec<[f64; 2]>, usize) {
    let mut coords = Vec::new();
    let mut skipped = 0;
    walk_geometry(value, &mut coords, &mut skipped);
    (coords, skipped)
}

fn walk_geometry(value: &Value, out: &mut Vec<[f64; 2]>, skipped: &mut usize) {
    let Value::Array(items) = value else {
        return;
    };

    if items.len() == 2 {
        if let (Some(lon), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) {
            out.push([lon, lat]);
            return;
        }
    }

    if items.iter().any(Value::is_array) {
        for item in items {
            walk_geometry(item, out, skipped);
        }
    } else {
        // Bottomed out on an array that is not a coordinate pair
        *skipped += 1;
    }
}

/// Densify a raw coordinate sequence and assign headings.
///
/// Processing order:
/// 1. Adjacent exactly-identical coordinates are collapsed.
/// 2. The first up-to-two coordinates are seeded verbatim.
/// 3. Every later coordinate is compared against the last accepted point by
///    planar Euclidean degree distance `d`; when `d` exceeds `threshold`,
///    the segment is split into `ceil(d / threshold)` pieces and the interior
///    split points are inserted, so no resulting gap exceeds the threshold.
/// 4. Each point receives the heading toward its successor,
///    `atan2(delta_lat, delta_lon)` in signed degrees; the last point keeps
///    none.
///
/// Inputs with fewer than two distinct points pass through untouched.
pub fn densify(raw: &[[f64; 2]], threshold: f64) -> Vec<PathPoint> {
    let mut path: Vec<PathPoint> = Vec::with_capacity(raw.len());

    for &[lon, lat] in raw {
        if let Some(last) = path.last() {
            if last.longitude == lon && last.latitude == lat {
                continue;
            }
        }

        // No densification between the very first pair
        if path.len() < 2 {
            path.push(PathPoint::new(lon, lat));
            continue;
        }

        let prev = path[path.len() - 1];
        let d = planar_distance(prev.longitude, prev.latitude, lon, lat);
        if d > threshold {
            let segments = (d / threshold).ceil() as usize;
            for i in 1..segments {
                let frac = i as f64 / segments as f64;
                path.push(PathPoint::new(
                    prev.longitude + (lon - prev.longitude) * frac,
                    prev.latitude + (lat - prev.latitude) * frac,
                ));
            }
        }
        path.push(PathPoint::new(lon, lat));
    }

    assign_headings(&mut path);
    path
}

/// Planar Euclidean distance in coordinate-degree units.
fn planar_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    ((lon2 - lon1).powi(2) + (lat2 - lat1).powi(2)).sqrt()
}

fn assign_headings(path: &mut [PathPoint]) {
    for i in 1..path.len() {
        let dlon = path[i].longitude - path[i - 1].longitude;
        let dlat = path[i].latitude - path[i - 1].latitude;
        path[i - 1].heading = Some(dlat.atan2(dlon).to_degrees());
    }
}
