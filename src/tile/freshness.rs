//! HTTP conditional caching with the client.
//!
//! Every response carries `Last-Modified`, `Expires`, `Cache-Control` and a
//! weak `ETag` derived from the target file's modification time and size.
//! A request is answered `304 Not Modified` when `If-Modified-Since` is not
//! older than the file, or when `If-None-Match` names the current ETag.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::header::{
    HeaderMap, HeaderValue, CACHE_CONTROL, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use httpdate::{fmt_http_date, parse_http_date};

use crate::zoomify::ResolvedLocation;

/// One day.
pub const DEFAULT_MAX_AGE_SECS: u64 = 86_400;

/// Decides between 200 and 304 and stamps the caching headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    max_age_secs: u64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE_SECS)
    }
}

impl FreshnessPolicy {
    pub fn new(max_age_secs: u64) -> Self {
        Self { max_age_secs }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    /// Weak validator: `W/"<mtime millis>_<size>"`.
    pub fn etag(location: &ResolvedLocation) -> String {
        format!(
            "W/\"{}_{}\"",
            location.last_modified_millis, location.size_bytes
        )
    }

    /// Write the caching headers into `response` and report whether the
    /// client's copy is still current.
    pub fn should_serve_not_modified(
        &self,
        request: &HeaderMap,
        location: &ResolvedLocation,
        response: &mut HeaderMap,
    ) -> bool {
        self.negotiate_at(request, location, response, SystemTime::now())
    }

    /// [`should_serve_not_modified`](Self::should_serve_not_modified) with an
    /// explicit clock.
    pub fn negotiate_at(
        &self,
        request: &HeaderMap,
        location: &ResolvedLocation,
        response: &mut HeaderMap,
        now: SystemTime,
    ) -> bool {
        let modified = UNIX_EPOCH + Duration::from_millis(location.last_modified_millis);
        let expires = now + Duration::from_secs(self.max_age_secs);
        let etag = Self::etag(location);

        insert(response, LAST_MODIFIED, &fmt_http_date(modified));
        insert(response, EXPIRES, &fmt_http_date(expires));
        insert(
            response,
            CACHE_CONTROL,
            &format!("max-age={}", self.max_age_secs),
        );
        insert(response, ETAG, &etag);

        not_modified_since(request, location.last_modified_millis)
            || matches_etag(request, &etag)
    }
}

fn insert(headers: &mut HeaderMap, name: http::header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

// HTTP dates carry whole seconds, so the file time is truncated to match.
fn not_modified_since(request: &HeaderMap, last_modified_millis: u64) -> bool {
    let Some(since) = request
        .get(IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_http_date(v.trim()).ok())
    else {
        return false;
    };
    let Ok(since) = since.duration_since(UNIX_EPOCH) else {
        return false;
    };
    since.as_secs() >= last_modified_millis / 1000
}

fn matches_etag(request: &HeaderMap, etag: &str) -> bool {
    request
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag)
}
