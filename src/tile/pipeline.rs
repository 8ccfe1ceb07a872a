//! The per-request state machine.
//!
//! ```text
//! Accepted -> Resolved -> NotModified
//!                      -> Serving -> CacheHit
//!                                 -> Fetching -> CacheStored
//! ```
//!
//! Every state ends in exactly one response: 304 with an empty body, 200 with
//! the full payload, or an error. The pipeline is synchronous and is meant to
//! run on a blocking worker; see `server::WorkerPool`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use tracing::info;

use super::cache::TileStore;
use super::freshness::FreshnessPolicy;
use super::source::ImageSource;
use crate::error::ZoomifyError;
use crate::zoomify::{resolve, RepositoryContext};

/// How a successful request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    NotModified,
    CacheHit,
    Fetched,
}

impl ServeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ServeOutcome::NotModified => "not-modified",
            ServeOutcome::CacheHit => "hit",
            ServeOutcome::Fetched => "miss",
        }
    }
}

impl fmt::Display for ServeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete response, ready to be written by the HTTP layer.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub outcome: ServeOutcome,
}

/// Resolve, negotiate, look up, fetch, store.
pub struct RequestPipeline<S> {
    repo: Arc<RepositoryContext>,
    freshness: FreshnessPolicy,
    cache: Arc<dyn TileStore>,
    source: S,
}

impl<S: ImageSource> RequestPipeline<S> {
    pub fn new(repo: Arc<RepositoryContext>, cache: Arc<dyn TileStore>, source: S) -> Self {
        Self {
            repo,
            freshness: FreshnessPolicy::default(),
            cache,
            source,
        }
    }

    pub fn with_freshness(mut self, freshness: FreshnessPolicy) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn repository(&self) -> &RepositoryContext {
        &self.repo
    }

    pub fn cache(&self) -> &Arc<dyn TileStore> {
        &self.cache
    }

    /// Serve `raw_path` (repository-relative, already percent-decoded).
    pub fn handle(
        &self,
        raw_path: &str,
        request: &HeaderMap,
    ) -> Result<PipelineResponse, ZoomifyError> {
        let start = Instant::now();
        let location = resolve(&self.repo, raw_path)?;

        let mut headers = HeaderMap::new();
        if self
            .freshness
            .should_serve_not_modified(request, &location, &mut headers)
        {
            let response = PipelineResponse {
                status: StatusCode::NOT_MODIFIED,
                headers,
                body: Bytes::new(),
                outcome: ServeOutcome::NotModified,
            };
            log_outcome(raw_path, &location.part_id, response.outcome, start);
            return Ok(response);
        }

        let key = location.cache_key();
        let (body, outcome) = match self.cache.get(&key) {
            Some(cached) => (cached, ServeOutcome::CacheHit),
            None => {
                let fetched = self
                    .source
                    .fetch(&location)
                    .map_err(|source| ZoomifyError::SourceReadFailure {
                        path: raw_path.to_string(),
                        source,
                    })?
                    .ok_or_else(|| ZoomifyError::PartNotFound {
                        path: raw_path.to_string(),
                    })?;
                self.cache.put(key, fetched.clone());
                (fetched, ServeOutcome::Fetched)
            }
        };

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(location.content_type()),
        );
        log_outcome(raw_path, &location.part_id, outcome, start);

        Ok(PipelineResponse {
            status: StatusCode::OK,
            headers,
            body,
            outcome,
        })
    }
}

fn log_outcome(path: &str, part: &str, outcome: ServeOutcome, start: Instant) {
    info!(
        path = %path,
        part = %part,
        outcome = %outcome,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Served Zoomify part"
    );
}
