//! Cache and conditional GET integration tests.
//!
//! Tests verify:
//! - The server-side cache serves repeat requests without touching the source
//! - ETag and If-Modified-Since validation answer 304 Not Modified
//! - Archive handles are released after every request

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

use zoomify_streamer::tile::{ImageSources, PyramidSource};
use zoomify_streamer::TiffPyramidEngine;

use super::test_utils::{
    body_bytes, build_router_with, get, get_with_headers, standard_pyramid, test_config,
    CountingEngine, CountingSource, TestRepo,
};

const PROPERTIES_URI: &str = "/zpprepo/sample.tif/ImageProperties.xml";
const TILE_URI: &str = "/zpprepo/sample.tif/TileGroup0/2-1-0.jpg";

fn counted_router(repo: &TestRepo) -> (axum::Router, Arc<std::sync::atomic::AtomicUsize>) {
    let sources = ImageSources::new(PyramidSource::new(TiffPyramidEngine::new()));
    let (source, fetches) = CountingSource::new(sources);
    (build_router_with(repo, source, test_config()), fetches)
}

fn single_header(name: header::HeaderName, value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(name, HeaderValue::from_str(value).unwrap());
    headers
}

// =============================================================================
// Server-Side Cache
// =============================================================================

#[tokio::test]
async fn test_second_request_is_a_cache_hit() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, fetches) = counted_router(&repo);

    let first = get(&router, TILE_URI).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-zoomify-cache").unwrap(), "miss");
    let first_body = body_bytes(first).await;

    let second = get(&router, TILE_URI).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-zoomify-cache").unwrap(), "hit");
    assert_eq!(
        second.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(body_bytes(second).await, first_body);

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parts_are_cached_independently() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    repo.add_file("other.tif", &standard_pyramid());
    let (router, fetches) = counted_router(&repo);

    for uri in [
        PROPERTIES_URI,
        TILE_URI,
        "/zpprepo/sample.tif/TileGroup0/2-2-1.jpg",
        "/zpprepo/other.tif/TileGroup0/2-1-0.jpg",
    ] {
        let response = get(&router, uri).await;
        assert_eq!(response.headers().get("x-zoomify-cache").unwrap(), "miss", "{}", uri);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 4);

    let response = get(&router, PROPERTIES_URI).await;
    assert_eq!(response.headers().get("x-zoomify-cache").unwrap(), "hit");
    assert_eq!(fetches.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_tile_group_does_not_affect_cache_key() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, fetches) = counted_router(&repo);

    get(&router, "/zpprepo/sample.tif/TileGroup0/2-1-0.jpg").await;
    let response = get(&router, "/zpprepo/sample.tif/TileGroup7/2-1-0.jpg").await;

    assert_eq!(response.headers().get("x-zoomify-cache").unwrap(), "hit");
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tile_spellings_share_a_cache_entry() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, fetches) = counted_router(&repo);

    let first = get(&router, "/zpprepo/sample.tif/TileGroup0/2-1-0.jpg").await;
    assert_eq!(first.headers().get("x-zoomify-cache").unwrap(), "miss");

    for uri in [
        "/zpprepo/sample.tif/TileGroup0/2-1-0.JPG",
        "/zpprepo/sample.tif/TileGroup0/02-1-00.jpg",
    ] {
        let response = get(&router, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(response.headers().get("x-zoomify-cache").unwrap(), "hit", "{}", uri);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_parts_are_not_cached() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, fetches) = counted_router(&repo);

    for _ in 0..2 {
        let response = get(&router, "/zpprepo/sample.tif/TileGroup0/9-0-0.jpg").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_requests_for_same_tile() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, _fetches) = counted_router(&repo);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            let response = get(&router, TILE_URI).await;
            assert_eq!(response.status(), StatusCode::OK);
            body_bytes(response).await
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(handle.await.unwrap());
    }
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_archive_handles_are_closed() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (engine, counters) = CountingEngine::new();
    let router = build_router_with(
        &repo,
        ImageSources::new(PyramidSource::new(engine)),
        test_config(),
    );

    for uri in [
        PROPERTIES_URI,
        TILE_URI,
        "/zpprepo/sample.tif/TileGroup0/9-9-9.jpg",
    ] {
        get(&router, uri).await;
    }

    assert_eq!(counters.opened.load(Ordering::SeqCst), 3);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 3);
}

// =============================================================================
// Conditional GET
// =============================================================================

#[tokio::test]
async fn test_if_none_match_returns_304() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, fetches) = counted_router(&repo);

    let response = get(&router, TILE_URI).await;
    let etag = response.headers().get("etag").unwrap().to_str().unwrap().to_string();
    assert!(etag.starts_with("W/\""));

    let response = get_with_headers(&router, TILE_URI, single_header(header::IF_NONE_MATCH, &etag)).await;

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get("x-zoomify-cache").unwrap(), "not-modified");
    assert_eq!(response.headers().get("etag").unwrap(), etag.as_str());
    assert!(response.headers().contains_key("cache-control"));
    assert!(response.headers().get("content-type").is_none());
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_if_none_match_wildcard_and_list() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, _fetches) = counted_router(&repo);

    let etag = get(&router, PROPERTIES_URI)
        .await
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let response =
        get_with_headers(&router, PROPERTIES_URI, single_header(header::IF_NONE_MATCH, "*")).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let list = format!("W/\"0_0\", {}", etag);
    let response =
        get_with_headers(&router, PROPERTIES_URI, single_header(header::IF_NONE_MATCH, &list)).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let response = get_with_headers(
        &router,
        PROPERTIES_URI,
        single_header(header::IF_NONE_MATCH, "W/\"0_0\""),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_if_modified_since() {
    let repo = TestRepo::new();
    repo.add_file("sample.tif", &standard_pyramid());
    let (router, _fetches) = counted_router(&repo);

    let response = get(&router, PROPERTIES_URI).await;
    let last_modified = response
        .headers()
        .get("last-modified")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let response = get_with_headers(
        &router,
        PROPERTIES_URI,
        single_header(header::IF_MODIFIED_SINCE, &last_modified),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let long_ago = httpdate::fmt_http_date(SystemTime::UNIX_EPOCH + Duration::from_secs(86_400));
    let response = get_with_headers(
        &router,
        PROPERTIES_URI,
        single_header(header::IF_MODIFIED_SINCE, &long_ago),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-zoomify-cache").unwrap(), "hit");
}

#[tokio::test]
async fn test_etag_tracks_file_changes() {
    let repo = TestRepo::new();
    let path = repo.add_file("sample.tif", &standard_pyramid());
    let (router, _fetches) = counted_router(&repo);

    let before = get(&router, PROPERTIES_URI).await;
    let etag_before = before.headers().get("etag").unwrap().clone();

    let mut grown = standard_pyramid();
    grown.extend_from_slice(&[0u8; 16]);
    std::fs::write(&path, &grown).unwrap();

    let response = get_with_headers(
        &router,
        PROPERTIES_URI,
        single_header(header::IF_NONE_MATCH, etag_before.to_str().unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(response.headers().get("etag").unwrap(), &etag_before);
}
