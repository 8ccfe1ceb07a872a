//! HTTP request handlers.
//!
//! # Endpoints
//!
//! - `GET {mount}/{*path}` - Zoomify metadata or tile
//! - `GET /view/{*path}` - OpenSeadragon viewer for a container
//! - `GET /health` - Health check

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::ZoomifyError;
use crate::tile::{ImageSource, PipelineResponse, RequestPipeline};

use super::pool::{PoolError, WorkerPool};

/// Response header reporting how the request was served.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-zoomify-cache");

// =============================================================================
// Application State
// =============================================================================

/// Shared state passed to every handler.
pub struct AppState<S> {
    pub pipeline: Arc<RequestPipeline<S>>,
    pub pool: WorkerPool,
    /// URL prefix the repository is served under, without trailing slash
    pub mount: Arc<str>,
}

impl<S: ImageSource> AppState<S> {
    pub fn new(pipeline: RequestPipeline<S>, pool: WorkerPool, mount: &str) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            pool,
            mount: Arc::from(mount.trim_end_matches('/')),
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            pool: self.pool.clone(),
            mount: Arc::clone(&self.mount),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Everything a Zoomify request can fail with.
#[derive(Debug)]
pub enum HandlerError {
    Zoomify(ZoomifyError),
    Pool(PoolError),
}

impl From<ZoomifyError> for HandlerError {
    fn from(err: ZoomifyError) -> Self {
        HandlerError::Zoomify(err)
    }
}

impl From<PoolError> for HandlerError {
    fn from(err: PoolError) -> Self {
        HandlerError::Pool(err)
    }
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Zoomify(ZoomifyError::InvalidPathFormat { .. })
            | HandlerError::Zoomify(ZoomifyError::SecurityViolation { .. }) => {
                StatusCode::BAD_REQUEST
            }
            HandlerError::Zoomify(ZoomifyError::PartNotFound { .. }) => StatusCode::NOT_FOUND,
            HandlerError::Zoomify(ZoomifyError::SourceReadFailure { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            HandlerError::Pool(PoolError::Busy) => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::Pool(PoolError::Worker(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing body. Never carries server paths or causes.
    fn message(&self) -> String {
        match self {
            HandlerError::Zoomify(err) => err.to_string(),
            HandlerError::Pool(PoolError::Busy) => "Server too busy".to_string(),
            HandlerError::Pool(PoolError::Worker(_)) => "Internal server error".to_string(),
        }
    }
}

/// 4xx are logged at WARN (404 at DEBUG), 5xx at ERROR with the cause.
impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            HandlerError::Zoomify(err @ ZoomifyError::SourceReadFailure { source, .. }) => {
                error!(
                    path = %err.path(),
                    status = status.as_u16(),
                    cause = %source,
                    "Failed to read Zoomify part"
                );
            }
            HandlerError::Zoomify(err) if status == StatusCode::NOT_FOUND => {
                debug!(path = %err.path(), status = status.as_u16(), "Zoomify part not found");
            }
            HandlerError::Zoomify(err) => {
                warn!(path = %err.path(), status = status.as_u16(), "Rejected Zoomify request: {}", err);
            }
            HandlerError::Pool(PoolError::Busy) => {
                warn!(status = status.as_u16(), "Worker pool saturated, rejecting request");
            }
            HandlerError::Pool(err) => {
                error!(status = status.as_u16(), "Worker failed: {}", err);
            }
        }

        let mut response = (status, self.message()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Strip the mount from a request URI path and percent-decode the remainder.
///
/// The result keeps its leading `/`, as the path grammar expects.
pub fn request_path(mount: &str, uri_path: &str) -> Result<String, ZoomifyError> {
    let invalid = || ZoomifyError::InvalidPathFormat {
        path: uri_path.to_string(),
    };
    let rest = uri_path.strip_prefix(mount).ok_or_else(invalid)?;
    if !rest.starts_with('/') {
        return Err(invalid());
    }
    urlencoding::decode(rest)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| invalid())
}

fn into_http(result: PipelineResponse) -> Response {
    let content_length = result.body.len();
    let mut response = Response::new(Body::from(result.body));
    *response.status_mut() = result.status;

    let headers = response.headers_mut();
    headers.extend(result.headers);
    if result.status == StatusCode::OK {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    }
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(result.outcome.as_str()),
    );
    response
}

/// Serve a Zoomify part.
///
/// # Endpoint
///
/// `GET {mount}/<container>/ImageProperties.xml`
/// `GET {mount}/<container>/TileGroup<n>/<level>-<col>-<row>.jpg`
///
/// # Response
///
/// - `200 OK`: part bytes, `text/xml` or `image/jpeg`
/// - `304 Not Modified`: the client's copy is current
/// - `400 Bad Request`: malformed path, or path escaping the repository
/// - `404 Not Found`: no such container or part
/// - `500 Internal Server Error`: the part could not be read
/// - `503 Service Unavailable`: all workers busy and the queue full
///
/// # Headers
///
/// `Last-Modified`, `Expires`, `Cache-Control`, `ETag` and
/// `X-Zoomify-Cache: hit|miss|not-modified`.
pub async fn zoomify_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let raw_path = request_path(&state.mount, uri.path())?;
    let pipeline = Arc::clone(&state.pipeline);

    let result = state
        .pool
        .run(move || pipeline.handle(&raw_path, &headers))
        .await??;

    Ok(into_http(result))
}

/// Viewer page for a container.
///
/// # Endpoint
///
/// `GET /view/{*path}`
///
/// The page itself always renders; a missing container shows up as a load
/// error in the browser when `ImageProperties.xml` returns 404.
pub async fn viewer_handler<S: ImageSource + 'static>(
    State(state): State<AppState<S>>,
    Path(container): Path<String>,
) -> Html<String> {
    Html(super::viewer::generate_viewer_html(&container, &state.mount))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
