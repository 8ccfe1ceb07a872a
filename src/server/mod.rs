//! HTTP server layer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │          GET {mount}/<container>/<Zoomify part>                 │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    pool     │  │        routes           │  │
//! │  │ (requests)  │  │ (admission) │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod pool;
pub mod routes;
mod viewer;

pub use handlers::{
    health_handler, request_path, viewer_handler, zoomify_handler, AppState, HandlerError,
    HealthResponse, CACHE_STATUS_HEADER,
};
pub use pool::{PoolError, WorkerPool, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS};
pub use routes::{create_router, RouterConfig, DEFAULT_MOUNT};
pub use viewer::{container_url, generate_viewer_html};
