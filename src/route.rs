//! Routing service client.
//!
//! Calls the pedestrian routing API with two WGS84 coordinates and turns the
//! returned feature geometry into a densified, heading-annotated path. The
//! geometry is treated purely as arbitrarily nested numeric-pair arrays; the
//! raw feature list is carried along untouched for API consumers.

use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, RoadviewError};
use crate::path::{densify, extract_coordinates, DEFAULT_DENSIFY_THRESHOLD};
use crate::PathPoint;

const DEFAULT_BASE_URL: &str =
    "https://apis.openapi.sk.com/tmap/routes/pedestrian?version=1&format=json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A routed, densified path plus the raw feature list it came from.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    /// Densified path with headings
    pub path: Vec<PathPoint>,
    /// The routing service's feature list, passed through verbatim
    pub raw: Value,
}

/// Client for the pedestrian routing service.
pub struct RouteClient {
    client: Client,
    base_url: String,
    app_key: String,
}

impl RouteClient {
    /// Create a routing client with the given application key.
    pub fn new(app_key: &str) -> Result<Self> {
        Self::with_base_url(app_key, DEFAULT_BASE_URL)
    }

    /// Create a routing client against a non-default endpoint (used by tests
    /// and alternative deployments).
    pub fn with_base_url(app_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RoadviewError::Route {
                message: format!("failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            app_key: app_key.to_string(),
        })
    }

    /// Request a route between two `(lng, lat)` string coordinate pairs and
    /// densify its geometry.
    pub async fn navigate(&self, start: (&str, &str), end: (&str, &str)) -> Result<RouteResult> {
        let form = [
            ("startX", start.0),
            ("startY", start.1),
            ("endX", end.0),
            ("endY", end.1),
            ("reqCoordType", "WGS84GEO"),
            ("resCoordType", "WGS84GEO"),
            ("startName", "start"),
            ("endName", "end"),
        ];

        let response = self
            .client
            .post(&self.base_url)
            .header("appKey", &self.app_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| RoadviewError::Route {
                message: e.to_string(),
                status_code: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoadviewError::Route {
                message: format!("routing request rejected ({})", status),
                status_code: Some(status.as_u16()),
            });
        }

        let body: Value = response.json().await.map_err(|e| RoadviewError::Route {
            message: format!("unparsable routing response: {}", e),
            status_code: None,
        })?;

        Ok(Self::build_result(&body))
    }

    /// Flatten the feature geometry and densify it. Exposed separately so the
    /// extraction contract is testable without the network.
    pub(crate) fn build_result(body: &Value) -> RouteResult {
        let features = body
            .get("features")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        let mut coords = Vec::new();
        let mut skipped = 0;
        if let Value::Array(items) = &features {
            for feature in items {
                if let Some(geometry) = feature.pointer("/geometry/coordinates") {
                    let (mut leaf_coords, leaf_skipped) = extract_coordinates(geometry);
                    coords.append(&mut leaf_coords);
                    skipped += leaf_skipped;
                }
            }
        }
        if skipped > 0 {
            debug!("Ignored {} non-pair geometry leaves", skipped);
        }

        let path = densify(&coords, DEFAULT_DENSIFY_THRESHOLD);
        info!(
            "Route has {} raw coordinates, {} densified points",
            coords.len(),
            path.len()
        );

        RouteResult { path, raw: features }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_result_densifies_feature_geometry() {
        let body = json!({
            "features": [
                {"geometry": {"type": "Point", "coordinates": [126.9, 37.5]}},
                {"geometry": {"type": "LineString", "coordinates": [
                    [126.9, 37.5],
                    [126.90005, 37.50005],
                ]}},
            ]
        });

        let result = RouteClient::build_result(&body);
        // Leading duplicate collapses; both remaining points are present
        assert_eq!(result.path.len(), 2);
        assert!(result.path[0].heading.is_some());
        assert!(result.path[1].heading.is_none());
        assert!(result.raw.is_array());
    }

    #[test]
    fn test_build_result_without_features() {
        let result = RouteClient::build_result(&json!({"error": "no route"}));
        assert!(result.path.is_empty());
        assert_eq!(result.raw, json!([]));
    }
}
