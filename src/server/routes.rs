//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                                          - Health check
//! /view/{*path}                                    - Viewer page
//! {mount}/<container>/ImageProperties.xml          - Zoomify descriptor
//! {mount}/<container>/TileGroup<n>/<l>-<c>-<r>.jpg - Zoomify tile
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zoomify_streamer::format::TiffPyramidEngine;
//! use zoomify_streamer::server::{create_router, RouterConfig};
//! use zoomify_streamer::tile::{ImageSources, PyramidSource, RequestPipeline, TileCache};
//! use zoomify_streamer::zoomify::RepositoryContext;
//!
//! let repo = Arc::new(RepositoryContext::open("../testrepo")?);
//! let sources = ImageSources::new(PyramidSource::new(TiffPyramidEngine::new()));
//! let pipeline = RequestPipeline::new(repo, Arc::new(TileCache::new()), sources);
//!
//! let router = create_router(pipeline, RouterConfig::new("/zpprepo"));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, viewer_handler, zoomify_handler, AppState, CACHE_STATUS_HEADER,
};
use super::pool::{WorkerPool, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS};
use crate::tile::{ImageSource, RequestPipeline};

/// Default URL prefix for the repository.
pub const DEFAULT_MOUNT: &str = "/zpprepo";

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// URL prefix the repository is served under
    pub mount: String,

    /// Concurrent pipeline workers
    pub workers: usize,

    /// Requests allowed to wait for a worker before 503
    pub queue_depth: usize,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT)
    }
}

impl RouterConfig {
    /// Defaults: 50 workers, queue of 200, any CORS origin, tracing on.
    pub fn new(mount: impl Into<String>) -> Self {
        Self {
            mount: mount.into(),
            workers: DEFAULT_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            cors_origins: None,
            enable_tracing: true,
        }
    }

    pub fn with_workers(mut self, workers: usize, queue_depth: usize) -> Self {
        self.workers = workers;
        self.queue_depth = queue_depth;
        self
    }

    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Build the application router around `pipeline`.
pub fn create_router<S>(pipeline: RequestPipeline<S>, config: RouterConfig) -> Router
where
    S: ImageSource + 'static,
{
    let pool = WorkerPool::new(config.workers, config.queue_depth);
    let app_state = AppState::new(pipeline, pool, &config.mount);
    let zoomify_route = format!("{}/{{*path}}", app_state.mount);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/view/{*path}", get(viewer_handler::<S>))
        .route(&zoomify_route, get(zoomify_handler::<S>))
        .with_state(app_state)
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, IF_MODIFIED_SINCE, IF_NONE_MATCH])
        .expose_headers([ETAG, LAST_MODIFIED, CACHE_STATUS_HEADER])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
