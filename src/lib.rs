//! # Roadview
//!
//! Route densification and street-level image matching for synthetic
//! drive-through videos.
//!
//! This library provides:
//! - Densification of sparse route polylines into evenly-spaced,
//!   heading-annotated paths
//! - A geotagged image index built from filename-encoded coordinates
//! - Greedy exclusive matching of path points to street-level photographs
//! - Optional clients for the routing service and the generative video
//!   backend, plus an embedded server that ties the pipeline together
//!
//! ## Features
//!
//! - **`http`** - Enable the routing-service and video-synthesis clients
//! - **`server`** - Enable the embedded HTTP server and background worker
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use roadview::{densify, DEFAULT_DENSIFY_THRESHOLD};
//!
//! // Raw route coordinates as [lon, lat] pairs
//! let raw = vec![
//!     [126.93786, 37.55169],
//!     [126.93793, 37.55163],
//!     [126.93846, 37.55209],
//! ];
//!
//! let path = densify(&raw, DEFAULT_DENSIFY_THRESHOLD);
//!
//! // Every point except the last carries a heading toward its successor
//! assert!(path.iter().rev().skip(1).all(|p| p.heading.is_some()));
//! assert!(path.last().unwrap().heading.is_none());
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, RoadviewError};

// Geographic utilities (haversine distance, angular difference)
pub mod geo_utils;
pub use geo_utils::{angular_difference, haversine_distance, haversine_distances};

// Geometry extraction and path densification
pub mod path;
pub use path::{densify, extract_coordinates, DEFAULT_DENSIFY_THRESHOLD};

// Image index built from filename-encoded coordinates
pub mod index;
pub use index::{load_image_index, ImageIndex, ImageRecord};

// Greedy exclusive path-to-image matching
pub mod matching;
pub use matching::{assign_images, find_matches, MatchConfig};

// Job state store for the server layer (injected, swappable)
pub mod store;
pub use store::{JobState, MemoryStore, RequestKey, VideoStore};

// Routing service client
#[cfg(feature = "http")]
pub mod route;
#[cfg(feature = "http")]
pub use route::{RouteClient, RouteResult};

// Generative video synthesis client
#[cfg(feature = "http")]
pub mod synthesis;
#[cfg(feature = "http")]
pub use synthesis::{SynthesisConfig, VideoSynthesizer};

// Embedded HTTP server
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub use server::{AppState, ServerConfig};

// ============================================================================
// Core Types
// ============================================================================

/// A point on a densified path: a WGS84 coordinate plus the direction of
/// travel toward its successor.
///
/// The final point of a path has no successor and therefore no heading.
///
/// # Example
/// ```
/// use roadview::PathPoint;
/// let point = PathPoint::new(126.9379, 37.5517);
/// assert!(point.heading.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub longitude: f64,
    pub latitude: f64,
    /// Direction toward the next point, in signed degrees `(-180, 180]`
    /// measured as `atan2(delta_lat, delta_lon)`. `None` for the last point.
    pub heading: Option<f64>,
}

impl PathPoint {
    /// Create a new path point without a heading.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            heading: None,
        }
    }

    /// Create a path point with a heading already assigned.
    pub fn with_heading(longitude: f64, latitude: f64, heading: f64) -> Self {
        Self {
            longitude,
            latitude,
            heading: Some(heading),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_point_constructors() {
        let p = PathPoint::new(126.9379, 37.5517);
        assert_eq!(p.longitude, 126.9379);
        assert_eq!(p.latitude, 37.5517);
        assert!(p.heading.is_none());

        let q = PathPoint::with_heading(126.9379, 37.5517, 45.0);
        assert_eq!(q.heading, Some(45.0));
    }

    #[test]
    fn test_path_point_serde_roundtrip() {
        let p = PathPoint::with_heading(126.9379, 37.5517, -43.7);
        let json = serde_json::to_string(&p).unwrap();
        let back: PathPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
