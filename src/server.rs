//! Embedded HTTP server.
//!
//! Thin glue around the pipeline: a request either returns a cached
//! drive-through video, reports an in-progress job, or kicks off a new one.
//! Synthesis runs in a background task while the handler returns the route
//! immediately; job visibility goes through the injected [`VideoStore`]
//! rather than process-global state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{Result, RoadviewError};
use crate::matching::{find_matches, MatchConfig};
use crate::route::{RouteClient, RouteResult};
use crate::store::{JobState, RequestKey, VideoStore};
use crate::synthesis::{SynthesisConfig, VideoSynthesizer};
use crate::PathPoint;

/// Server configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root of the on-disk layout: `images/` holds the photo library,
    /// `cache/` the finished videos
    pub data_dir: PathBuf,
    pub route_app_key: String,
    pub synthesis_api_key: String,
    /// Override for the generative model identifier
    pub model_id: Option<String>,
}

impl ServerConfig {
    /// Read configuration from the environment, creating the data directory
    /// if it does not exist yet.
    pub fn from_env() -> Result<Self> {
        let host = require_env("HOST")?;
        let port = require_env("PORT")?
            .parse()
            .map_err(|e| RoadviewError::Config {
                message: format!("PORT is not a valid port number: {}", e),
            })?;
        let data_dir = PathBuf::from(require_env("DATA_DIR")?);
        std::fs::create_dir_all(&data_dir)?;

        Ok(Self {
            host,
            port,
            data_dir,
            route_app_key: require_env("TMAP_APP_KEY")?,
            synthesis_api_key: require_env("API_KEY")?,
            model_id: std::env::var("VIDEO_MODEL_ID").ok(),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| RoadviewError::Config {
        message: format!("missing required environment variable {}", name),
    })
}

/// Shared server state. The store is injected so it can be swapped for a
/// persistent or distributed implementation.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn VideoStore>,
    route_client: Arc<RouteClient>,
    synthesizer: Arc<VideoSynthesizer>,
    data_dir: PathBuf,
    match_config: MatchConfig,
}

impl AppState {
    pub fn new(config: &ServerConfig, store: Arc<dyn VideoStore>) -> Result<Self> {
        let mut synthesis_config = SynthesisConfig::default();
        if let Some(model_id) = &config.model_id {
            synthesis_config.model_id = model_id.clone();
        }

        Ok(Self {
            store,
            route_client: Arc::new(RouteClient::new(&config.route_app_key)?),
            synthesizer: Arc::new(VideoSynthesizer::new(
                &config.synthesis_api_key,
                synthesis_config,
            )?),
            data_dir: config.data_dir.clone(),
            match_config: MatchConfig::default(),
        })
    }
}

/// Build the application router with permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get-meta", get(get_meta))
        .route("/gen-video", get(gen_video))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| RoadviewError::Io {
            message: e.to_string(),
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoordsQuery {
    start_lat: String,
    start_lng: String,
    end_lat: String,
    end_lng: String,
}

impl CoordsQuery {
    fn key(&self) -> RequestKey {
        RequestKey::new(&self.start_lng, &self.start_lat, &self.end_lng, &self.end_lat)
    }

    fn start(&self) -> (&str, &str) {
        (&self.start_lng, &self.start_lat)
    }

    fn end(&self) -> (&str, &str) {
        (&self.end_lng, &self.end_lat)
    }
}

#[derive(Debug, Serialize)]
struct MetaResponse {
    key: String,
    result: RouteResult,
}

/// `GET /get-meta` - route metadata for a request whose video already exists.
async fn get_meta(State(state): State<AppState>, Query(query): Query<CoordsQuery>) -> Response {
    let key = query.key();

    match state.store.get(&key) {
        JobState::Ready(_) => match state
            .route_client
            .navigate(query.start(), query.end())
            .await
        {
            Ok(result) => Json(MetaResponse {
                key: key.to_string(),
                result,
            })
            .into_response(),
            Err(err) => routing_failure(err),
        },
        JobState::Pending => status_message(StatusCode::ACCEPTED, "in progress"),
        JobState::Absent => status_message(StatusCode::BAD_REQUEST, "invalid request"),
    }
}

/// `GET /gen-video` - serve the finished video, report progress, or start a
/// new synthesis job and return the route immediately.
async fn gen_video(State(state): State<AppState>, Query(query): Query<CoordsQuery>) -> Response {
    let key = query.key();

    match state.store.get(&key) {
        JobState::Ready(artifact) => serve_video(&artifact).await,
        JobState::Pending => status_message(StatusCode::ACCEPTED, "in progress"),
        JobState::Absent => {
            // A video from a previous process may already sit on disk
            let artifact = state.data_dir.join("cache").join(format!("{}.mp4", key));
            if artifact.exists() {
                state.store.complete(&key, artifact.clone());
                return serve_video(&artifact).await;
            }

            let result = match state
                .route_client
                .navigate(query.start(), query.end())
                .await
            {
                Ok(result) => result,
                Err(err) => return routing_failure(err),
            };

            state.store.mark_pending(&key);
            tokio::spawn(run_synthesis_job(
                state.clone(),
                key.clone(),
                result.path.clone(),
            ));

            Json(MetaResponse {
                key: key.to_string(),
                result,
            })
            .into_response()
        }
    }
}

/// Background unit of work: match the path against the photo library and
/// synthesize the video, then settle the store entry either way.
async fn run_synthesis_job(state: AppState, key: RequestKey, path: Vec<PathPoint>) {
    let image_dir = state.data_dir.join("images");

    // The matcher is synchronous CPU/filesystem work with no await points
    let assignments = {
        let image_dir = image_dir.clone();
        let match_config = state.match_config.clone();
        let path = path.clone();
        tokio::task::spawn_blocking(move || find_matches(&path, &image_dir, &match_config))
            .await
            .unwrap_or_default()
    };

    let images: Vec<PathBuf> = assignments
        .into_iter()
        .flatten()
        .map(|filename| image_dir.join(filename))
        .collect();

    if images.len() < 2 {
        warn!(
            "Job {}: {} matched image(s), nothing to synthesize",
            key,
            images.len()
        );
        state.store.fail(&key);
        return;
    }

    let out_dir = state.data_dir.join("cache");
    if let Err(err) = tokio::fs::create_dir_all(&out_dir).await {
        warn!("Job {}: cannot create cache directory: {}", key, err);
        state.store.fail(&key);
        return;
    }

    match state
        .synthesizer
        .synthesize(&images, &out_dir, &format!("{}.mp4", key))
        .await
    {
        Ok(artifact) => {
            info!("Job {}: video ready at {}", key, artifact.display());
            state.store.complete(&key, artifact);
        }
        Err(err) => {
            warn!("Job {}: synthesis failed: {}", key, err);
            state.store.fail(&key);
        }
    }
}

async fn serve_video(artifact: &std::path::Path) -> Response {
    match tokio::fs::read(artifact).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "video/mp4")],
            bytes,
        )
            .into_response(),
        Err(err) => {
            warn!("Cannot read artifact {}: {}", artifact.display(), err);
            status_message(StatusCode::INTERNAL_SERVER_ERROR, "artifact unreadable")
        }
    }
}

fn status_message(code: StatusCode, detail: &str) -> Response {
    (code, Json(json!({ "detail": detail }))).into_response()
}

fn routing_failure(err: RoadviewError) -> Response {
    warn!("Routing call failed: {}", err);
    status_message(StatusCode::BAD_GATEWAY, &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coords_query_key_order() {
        let query = CoordsQuery {
            start_lat: "37.56".to_string(),
            start_lng: "126.99".to_string(),
            end_lat: "37.55".to_string(),
            end_lng: "126.98".to_string(),
        };
        // Key renders lng-first, matching the artifact naming scheme
        assert_eq!(query.key().to_string(), "126.99,37.56,126.98,37.55");
    }

    #[test]
    fn test_coords_query_camel_case() {
        let query: CoordsQuery = serde_json::from_value(json!({
            "startLat": "37.56",
            "startLng": "126.99",
            "endLat": "37.55",
            "endLng": "126.98",
        }))
        .unwrap();
        assert_eq!(query.start(), ("126.99", "37.56"));
        assert_eq!(query.end(), ("126.98", "37.55"));
    }
}
