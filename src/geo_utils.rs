//! Geographic utilities: great-circle distance and bearing differences.
//!
//! Distances use the haversine formula with a fixed Earth radius. Inputs are
//! WGS84 degrees; out-of-range coordinates are not sanitized.

/// Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two GPS coordinates, in meters.
///
/// Symmetric: `haversine_distance(a, b) == haversine_distance(b, a)`.
///
/// # Example
/// ```
/// use roadview::haversine_distance;
/// // London to Paris, roughly 343 km
/// let d = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
/// assert!((d / 1000.0 - 343.0).abs() < 2.0);
/// ```
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Distances from one fixed point to many `(lat, lon)` candidates, in meters.
///
/// Output order matches candidate order.
pub fn haversine_distances(lat: f64, lon: f64, targets: &[(f64, f64)]) -> Vec<f64> {
    targets
        .iter()
        .map(|&(t_lat, t_lon)| haversine_distance(lat, lon, t_lat, t_lon))
        .collect()
}

/// Smallest difference between two angles, in degrees within `[0, 180]`.
///
/// Symmetric and defined for any real inputs; the raw difference is
/// normalized into `[0, 360)` before taking the shorter way around.
///
/// # Example
/// ```
/// use roadview::angular_difference;
/// assert_eq!(angular_difference(10.0, 350.0), 20.0);
/// assert_eq!(angular_difference(-170.0, 170.0), 20.0);
/// ```
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs().rem_euclid(360.0);
    diff.min(360.0 - diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // London to Paris is approximately 343 km
        let d = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!(d > 340_000.0 && d < 346_000.0);
    }

    #[test]
    fn test_haversine_symmetry() {
        let pairs = [
            (51.5074, -0.1278, 48.8566, 2.3522),
            (37.5517, 126.9379, 37.5520, 126.9385),
            (-33.8688, 151.2093, 35.6762, 139.6503),
        ];
        for (lat1, lon1, lat2, lon2) in pairs {
            let ab = haversine_distance(lat1, lon1, lat2, lon2);
            let ba = haversine_distance(lat2, lon2, lat1, lon1);
            assert!((ab - ba).abs() < 1e-9);
        }
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_distance(37.5517, 126.9379, 37.5517, 126.9379), 0.0);
    }

    #[test]
    fn test_haversine_broadcast_preserves_order() {
        let targets = vec![(48.8566, 2.3522), (51.5074, -0.1278), (37.5517, 126.9379)];
        let dists = haversine_distances(51.5074, -0.1278, &targets);
        assert_eq!(dists.len(), 3);
        assert!(dists[0] > 100_000.0);
        assert_eq!(dists[1], 0.0);
        assert!(dists[2] > dists[0]);
    }

    #[test]
    fn test_angular_difference_basic() {
        assert_eq!(angular_difference(0.0, 90.0), 90.0);
        assert_eq!(angular_difference(90.0, 0.0), 90.0);
        assert_eq!(angular_difference(0.0, 180.0), 180.0);
        assert_eq!(angular_difference(45.0, 45.0), 0.0);
    }

    #[test]
    fn test_angular_difference_wraparound() {
        assert_eq!(angular_difference(10.0, 350.0), 20.0);
        assert_eq!(angular_difference(350.0, 10.0), 20.0);
        // Signed headings as produced by atan2
        assert_eq!(angular_difference(-170.0, 170.0), 20.0);
    }

    #[test]
    fn test_angular_difference_unbounded_inputs() {
        // Inputs outside [0, 360) still land in [0, 180]
        let d = angular_difference(725.0, 0.0);
        assert!((d - 5.0).abs() < 1e-9);
        let d = angular_difference(-725.0, 0.0);
        assert!((d - 5.0).abs() < 1e-9);
    }
}
