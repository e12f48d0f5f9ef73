//! Greedy exclusive matching of path points to street-level images.
//!
//! Each path point (except the last, which carries no heading) claims at most
//! one image within the distance and bearing tolerances. A claimed image is
//! never reconsidered for a later point: the pass is forward-only and
//! first-come-first-served, not a globally optimal assignment. Unmatched
//! points are absences, not errors.

use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{angular_difference, haversine_distances};
use crate::index::{load_image_index, ImageIndex};
use crate::PathPoint;

/// Tolerances for path-to-image matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Maximum great-circle distance between a path point and an image, in
    /// meters. Default: 10.0
    pub max_distance_m: f64,
    /// Maximum difference between the path heading and the camera heading,
    /// in degrees. Default: 90.0
    pub max_angle_deg: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_distance_m: 10.0,
            max_angle_deg: 90.0,
        }
    }
}

/// Match a densified path against an image folder.
///
/// Builds a fresh index from `image_folder` (a missing folder degrades to an
/// empty index) and delegates to [`assign_images`]. Returns one entry per
/// path point except the last; `None` marks a point with no suitable image.
pub fn find_matches(
    path: &[PathPoint],
    image_folder: &Path,
    config: &MatchConfig,
) -> Vec<Option<String>> {
    let index = load_image_index(image_folder);
    info!(
        "Loaded {} images from {} ({} skipped)",
        index.len(),
        image_folder.display(),
        index.skipped.len()
    );

    let assignments = assign_images(path, &index, config);

    let matched = assignments.iter().filter(|a| a.is_some()).count();
    info!(
        "Matched {}/{} path points against {} images",
        matched,
        assignments.len(),
        index.len()
    );

    assignments
}

/// Assign images to path points, greedily and exclusively.
///
/// For each path point in order: compute the distance to every record and
/// the angular difference against every record's heading, keep the records
/// within both tolerances that no earlier point has claimed, and take the
/// closest of those (ties broken by index order). The winner is reserved for
/// the rest of the run.
///
/// The result is injective over filenames and deterministic for identical
/// inputs. An empty index yields all-`None`.
pub fn assign_images(
    path: &[PathPoint],
    index: &ImageIndex,
    config: &MatchConfig,
) -> Vec<Option<String>> {
    let query_count = path.len().saturating_sub(1);
    let mut assignments: Vec<Option<String>> = Vec::with_capacity(query_count);

    if index.is_empty() {
        warn!("No image records to match against");
        assignments.resize(query_count, None);
        return assignments;
    }

    let positions: Vec<(f64, f64)> = index
        .records
        .iter()
        .map(|r| (r.latitude, r.longitude))
        .collect();
    let mut used = vec![false; index.records.len()];

    for (i, point) in path.iter().take(query_count).enumerate() {
        let Some(heading) = point.heading else {
            assignments.push(None);
            continue;
        };

        let distances = haversine_distances(point.latitude, point.longitude, &positions);

        let mut best: Option<(usize, f64)> = None;
        for (j, record) in index.records.iter().enumerate() {
            if used[j]
                || distances[j] > config.max_distance_m
                || angular_difference(heading, record.heading) > config.max_angle_deg
            {
                continue;
            }
            // Strict comparison keeps the first-encountered minimum on ties
            if best.map_or(true, |(_, d)| distances[j] < d) {
                best = Some((j, distances[j]));
            }
        }

        match best {
            Some((j, distance)) => {
                used[j] = true;
                debug!(
                    "Point {}: matched {} at {:.2}m",
                    i, index.records[j].filename, distance
                );
                assignments.push(Some(index.records[j].filename.clone()));
            }
            None => {
                log_nearest_rejected(i, heading, index, &distances, &used);
                assignments.push(None);
            }
        }
    }

    assignments
}

/// Diagnostic for an unmatched point: report its nearest record overall and
/// whether that record was already claimed.
fn log_nearest_rejected(
    point_idx: usize,
    heading: f64,
    index: &ImageIndex,
    distances: &[f64],
    used: &[bool],
) {
    let Some((nearest, distance)) = distances
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(j, &d)| (j, d))
    else {
        return;
    };

    let record = &index.records[nearest];
    debug!(
        "Point {}: no match; nearest is {} at {:.2}m, angle diff {:.2} deg{}",
        point_idx,
        record.filename,
        distance,
        angular_difference(heading, record.heading),
        if used[nearest] {
            " (already claimed by an earlier point)"
        } else {
            ""
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ImageRecord;
    use crate::path::densify;

    fn record(filename: &str, lon: f64, lat: f64, heading: f64) -> ImageRecord {
        ImageRecord {
            filename: filename.to_string(),
            longitude: lon,
            latitude: lat,
            heading,
        }
    }

    fn index_of(records: Vec<ImageRecord>) -> ImageIndex {
        ImageIndex {
            records,
            skipped: Vec::new(),
        }
    }

    /// Path heading due north (atan2 convention: 90 degrees).
    fn northbound_path() -> Vec<PathPoint> {
        densify(
            &[[0.0, 0.0], [0.0, 0.00005], [0.0, 0.0001]],
            0.001, // no insertion
        )
    }

    #[test]
    fn test_empty_index_all_absent() {
        let path = northbound_path();
        let result = assign_images(&path, &index_of(vec![]), &MatchConfig::default());
        assert_eq!(result.len(), path.len() - 1);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_basic_match_within_tolerances() {
        let path = northbound_path();
        let index = index_of(vec![record("a.png", 0.0, 0.0, 90.0)]);
        let result = assign_images(&path, &index, &MatchConfig::default());
        assert_eq!(result[0].as_deref(), Some("a.png"));
    }

    #[test]
    fn test_distance_tolerance_excludes() {
        let path = northbound_path();
        // ~111m east of the path, heading aligned
        let index = index_of(vec![record("far.png", 0.001, 0.0, 90.0)]);
        let result = assign_images(&path, &index, &MatchConfig::default());
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_angle_tolerance_excludes() {
        let path = northbound_path();
        // Right next to the path but facing the opposite way
        let index = index_of(vec![record("rev.png", 0.0, 0.0, -90.0)]);
        let result = assign_images(&path, &index, &MatchConfig::default());
        assert!(result.iter().all(Option::is_none));

        let relaxed = MatchConfig {
            max_angle_deg: 180.0,
            ..MatchConfig::default()
        };
        let result = assign_images(&path, &index, &relaxed);
        assert_eq!(result[0].as_deref(), Some("rev.png"));
    }

    #[test]
    fn test_exclusivity_no_filename_reused() {
        let path = northbound_path();
        let index = index_of(vec![
            record("a.png", 0.0, 0.0, 90.0),
            record("b.png", 0.0, 0.00005, 90.0),
        ]);
        let result = assign_images(&path, &index, &MatchConfig::default());

        let mut names: Vec<&str> = result.iter().flatten().map(String::as_str).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_point_zero_wins_over_later_point() {
        // Both images sit within tolerance of point 0, but only "shared.png"
        // is within tolerance of point 1. Point 0 claims its nearest, which
        // is shared.png, so point 1 ends up with nothing even though it
        // would have preferred that same image.
        let path = northbound_path();
        let index = index_of(vec![
            record("shared.png", 0.0, 0.00002, 90.0),
            record("south.png", 0.0, -0.00003, 90.0),
        ]);
        let config = MatchConfig {
            max_distance_m: 4.0,
            max_angle_deg: 90.0,
        };

        let result = assign_images(&path, &index, &config);
        assert_eq!(result[0].as_deref(), Some("shared.png"));
        // south.png is ~3.3m from point 0 but ~8.9m from point 1
        assert_eq!(result[1], None);
    }

    #[test]
    fn test_tie_break_first_encountered() {
        let path = northbound_path();
        // Identical positions and headings: listing order decides
        let index = index_of(vec![
            record("first.png", 0.0, 0.0, 90.0),
            record("second.png", 0.0, 0.0, 90.0),
        ]);
        let result = assign_images(&path, &index, &MatchConfig::default());
        assert_eq!(result[0].as_deref(), Some("first.png"));
        assert_eq!(result[1].as_deref(), Some("second.png"));
    }

    #[test]
    fn test_determinism() {
        let path = northbound_path();
        let index = index_of(vec![
            record("a.png", 0.0, 0.00001, 90.0),
            record("b.png", 0.0, 0.00004, 90.0),
            record("c.png", 0.0, 0.00008, 90.0),
        ]);
        let first = assign_images(&path, &index, &MatchConfig::default());
        for _ in 0..5 {
            assert_eq!(assign_images(&path, &index, &MatchConfig::default()), first);
        }
    }

    #[test]
    fn test_find_matches_missing_folder_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("images");
        let path = northbound_path();

        let result = find_matches(&path, &missing, &MatchConfig::default());
        assert_eq!(result.len(), path.len() - 1);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_default_tolerances() {
        let config = MatchConfig::default();
        assert_eq!(config.max_distance_m, 10.0);
        assert_eq!(config.max_angle_deg, 90.0);
    }
}
