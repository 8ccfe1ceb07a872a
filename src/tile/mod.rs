//! Request serving layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             HTTP handlers               │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            RequestPipeline              │
//! │  resolve → FreshnessPolicy → TileStore  │
//! └────────────────────┬────────────────────┘
//!                      ▼ (miss)
//! ┌─────────────────────────────────────────┐
//! │             ImageSources                │
//! │  FileBundleSource  │  PyramidSource<E>  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! - [`RequestPipeline`]: one request from raw path to response
//! - [`FreshnessPolicy`]: conditional GET handling and caching headers
//! - [`TileCache`]: byte-bounded LRU behind the [`TileStore`] trait
//! - [`ImageSource`]: file bundles and pyramid archives
//! - [`JpegTileEncoder`]: crops and re-encodes tiles that cannot be passed
//!   through
//!
//! # Example
//!
//! ```
//! use zoomify_streamer::tile::{TileCache, TileStore};
//! use zoomify_streamer::zoomify::CacheKey;
//! use bytes::Bytes;
//!
//! let cache = TileCache::with_capacity(50 * 1024 * 1024);
//! let key = CacheKey::new("/repo/slide.tif", "0-0-0.jpg");
//!
//! if cache.get(&key).is_none() {
//!     cache.put(key.clone(), Bytes::from_static(b"jpeg"));
//! }
//! assert_eq!(cache.len(), 1);
//! ```

mod cache;
mod encoder;
mod freshness;
mod pipeline;
mod source;

pub use cache::{TileCache, TileStore, DEFAULT_MAX_ENTRIES, DEFAULT_TILE_CACHE_CAPACITY};
pub use encoder::{
    clamp_quality, is_valid_quality, JpegTileEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use freshness::{FreshnessPolicy, DEFAULT_MAX_AGE_SECS};
pub use pipeline::{PipelineResponse, RequestPipeline, ServeOutcome};
pub use source::{FileBundleSource, ImageSource, ImageSources, PyramidSource};
