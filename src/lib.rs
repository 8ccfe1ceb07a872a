//! # Zoomify Streamer
//!
//! A Zoomify tile server for images stored on local disk.
//!
//! A repository root holds two kinds of containers, addressed by the same
//! Zoomify URL scheme:
//!
//! - **File bundles**: directories with a pre-cut `ImageProperties.xml` and
//!   `TileGroup<n>/<level>-<col>-<row>.jpg` files
//! - **Pyramid archives**: single tiled pyramidal TIFF or BigTIFF files, from
//!   which the descriptor and tiles are produced on demand
//!
//! ## Features
//!
//! - **Path containment**: request paths are checked lexically and again after
//!   symlinks are resolved, so nothing outside the root is ever read
//! - **Conditional GET**: weak ETags, `Last-Modified`, `Expires` and
//!   `Cache-Control`, answered with `304 Not Modified` when the client is current
//! - **Server-side cache**: byte-bounded LRU of served parts
//! - **Bounded concurrency**: a fixed worker pool with a bounded queue; excess
//!   load is rejected with `503`
//! - **Built-in web viewer**: OpenSeadragon page per container
//!
//! ## Architecture
//!
//! - [`zoomify`] - path grammar, repository root, resolution, descriptor
//! - [`tile`] - request pipeline, freshness, cache, image sources, encoding
//! - [`mod@format`] - pyramid engine: TIFF parsing and JPEG handling
//! - [`io`] - range readers over files and memory
//! - [`server`] - Axum router, handlers and worker pool
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zoomify_streamer::{
//!     create_router, ImageSources, PyramidSource, RepositoryContext, RequestPipeline,
//!     RouterConfig, TiffPyramidEngine, TileCache,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = Arc::new(RepositoryContext::open("../testrepo")?);
//!     let sources = ImageSources::new(PyramidSource::new(TiffPyramidEngine::new()));
//!     let pipeline = RequestPipeline::new(repo, Arc::new(TileCache::new()), sources);
//!
//!     let router = create_router(pipeline, RouterConfig::default());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod server;
pub mod tile;
pub mod zoomify;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, ExtractConfig, ServeConfig};
pub use error::{
    EngineError, IoError, RepositoryError, SourceError, TiffError, ZoomifyError,
};
pub use format::{PyramidEngine, PyramidHandle, TiffPyramidEngine, TiffPyramidHandle};
pub use io::{FileRangeReader, MemoryRangeReader, RangeReader};
pub use server::{
    create_router, health_handler, zoomify_handler, AppState, HandlerError, HealthResponse,
    PoolError, RouterConfig, WorkerPool,
};
pub use tile::{
    FileBundleSource, FreshnessPolicy, ImageSource, ImageSources, JpegTileEncoder,
    PipelineResponse, PyramidSource, RequestPipeline, ServeOutcome, TileCache, TileStore,
    DEFAULT_JPEG_QUALITY,
};
pub use zoomify::{
    resolve, CacheKey, PartKind, RepositoryContext, ResolvedLocation, StorageKind, TileCoord,
    ZoomifyProperties,
};
