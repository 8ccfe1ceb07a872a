//! API integration tests for metadata and tile retrieval.
//!
//! Tests verify:
//! - Metadata and tiles from pyramid archives and file bundles
//! - Error cases (malformed path, missing container, missing tile, corrupt archive)
//! - HTTP response codes and headers
//! - Viewer, health and worker pool saturation

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use zoomify_streamer::{ImageSources, PyramidSource, RouterConfig, TiffPyramidEngine};

use super::test_utils::{
    body_bytes, body_text, build_router, build_router_with, create_test_rgb_jpeg, get,
    jpeg_dimensions, standard_pyramid, test_config, GatedSource, TestRepo, STANDARD_PROPERTIES,
};

fn pyramid_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.add_file("slides/sample.tif", &standard_pyramid());
    repo
}

// =============================================================================
// Pyramid Archives
// =============================================================================

#[tokio::test]
async fn test_pyramid_image_properties() {
    let repo = pyramid_repo();
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/slides/sample.tif/ImageProperties.xml").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/xml");
    assert_eq!(
        response.headers().get("content-length").unwrap(),
        &STANDARD_PROPERTIES.len().to_string()
    );
    assert_eq!(body_text(response).await, STANDARD_PROPERTIES);
}

#[tokio::test]
async fn test_pyramid_interior_tile() {
    let repo = pyramid_repo();
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/slides/sample.tif/TileGroup0/2-0-0.jpg").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    assert!(response.headers().contains_key("etag"));
    assert!(response.headers().contains_key("last-modified"));
    assert!(response.headers().contains_key("expires"));
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "max-age=86400"
    );

    let body = body_bytes(response).await;
    assert_eq!(&body[..], &create_test_rgb_jpeg(256, 256, 90)[..]);
}

#[tokio::test]
async fn test_pyramid_edge_tile_is_cropped() {
    let repo = pyramid_repo();
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/slides/sample.tif/TileGroup0/2-2-1.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(jpeg_dimensions(&body_bytes(response).await), (88, 144));

    // Level 0 is the whole image in a single tile
    let response = get(&router, "/zpprepo/slides/sample.tif/TileGroup0/0-0-0.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(jpeg_dimensions(&body_bytes(response).await), (150, 100));
}

#[tokio::test]
async fn test_grammar_is_case_insensitive() {
    let repo = pyramid_repo();
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/slides/sample.tif/imageproperties.XML").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, "/zpprepo/slides/sample.tif/tilegroup3/1-1-0.JPG").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tile_out_of_range() {
    let repo = pyramid_repo();
    let router = build_router(&repo);

    for path in ["3-0-0.jpg", "2-3-0.jpg", "2-0-2.jpg", "1-2-0.jpg"] {
        let uri = format!("/zpprepo/slides/sample.tif/TileGroup0/{}", path);
        let response = get(&router, &uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
    }
}

#[tokio::test]
async fn test_corrupt_archive() {
    let repo = TestRepo::new();
    repo.add_file("broken.tif", b"this is not a tiff file at all");
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/broken.tif/ImageProperties.xml").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
    let body = body_text(response).await;
    assert!(!body.contains(repo.root().to_str().unwrap()));
    assert!(!body.contains("magic"));
}

#[tokio::test]
async fn test_percent_encoded_container() {
    let repo = TestRepo::new();
    repo.add_file("my slides/scan 1.tif", &standard_pyramid());
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/my%20slides/scan%201.tif/ImageProperties.xml").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, STANDARD_PROPERTIES);
}

// =============================================================================
// File Bundles
// =============================================================================

#[tokio::test]
async fn test_bundle_parts_are_served_verbatim() {
    let repo = TestRepo::new();
    let props = "<IMAGE_PROPERTIES WIDTH=\"300\" HEIGHT=\"200\" NUMTILES=\"3\" NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"256\" />";
    let tile = create_test_rgb_jpeg(44, 200, 80);
    repo.add_bundle("bundles/scan", props, &[(0, "1-1-0.jpg", &tile)]);
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/bundles/scan/ImageProperties.xml").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/xml");
    assert_eq!(body_text(response).await, props);

    let response = get(&router, "/zpprepo/bundles/scan/TileGroup0/1-1-0.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    assert_eq!(&body_bytes(response).await[..], &tile[..]);
}

#[tokio::test]
async fn test_bundle_missing_tile() {
    let repo = TestRepo::new();
    repo.add_bundle("scan", "<IMAGE_PROPERTIES />", &[]);
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/scan/TileGroup0/0-0-0.jpg").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_missing_container() {
    let repo = TestRepo::new();
    let router = build_router(&repo);

    let response = get(&router, "/zpprepo/nowhere/slide.tif/ImageProperties.xml").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
    assert!(response.headers().get("x-zoomify-cache").is_none());
}

#[tokio::test]
async fn test_malformed_paths() {
    let repo = pyramid_repo();
    let router = build_router(&repo);

    for uri in [
        "/zpprepo/slides/sample.tif/thumbnail.png",
        "/zpprepo/slides/sample.tif/TileGroup0/2-0.jpg",
        "/zpprepo/slides/sample.tif/TileGroupX/2-0-0.jpg",
        "/zpprepo/slides/sample.tif/TileGroup0/2-0-0.png",
        "/zpprepo/ImageProperties.xml",
        "/zpprepo/slides/sample.tif/TileGroup0/99999999999-0-0.jpg",
    ] {
        let response = get(&router, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn test_unknown_route() {
    let repo = TestRepo::new();
    let router = build_router(&repo);

    let response = get(&router, "/elsewhere/slide.tif/ImageProperties.xml").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_custom_mount() {
    let repo = pyramid_repo();
    let router = build_router_with(
        &repo,
        ImageSources::new(PyramidSource::new(TiffPyramidEngine::new())),
        RouterConfig::new("/tiles/").with_tracing(false),
    );

    let response = get(&router, "/tiles/slides/sample.tif/ImageProperties.xml").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, "/zpprepo/slides/sample.tif/ImageProperties.xml").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Health and Viewer
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let repo = TestRepo::new();
    let router = build_router(&repo);

    let response = get(&router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_viewer_page() {
    let repo = pyramid_repo();
    let router = build_router(&repo);

    let response = get(&router, "/view/slides/sample.tif").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));
    let html = body_text(response).await;
    assert!(html.contains("zoomifytileservice"));
    assert!(html.contains("/zpprepo/slides/sample.tif/ImageProperties.xml"));
}

// =============================================================================
// Worker Pool
// =============================================================================

#[tokio::test]
async fn test_saturated_pool_answers_503() {
    let repo = pyramid_repo();
    let (source, entered, release) = GatedSource::new();
    let router = build_router_with(&repo, source, test_config().with_workers(1, 0));

    let first = {
        let router = router.clone();
        tokio::spawn(async move {
            let request = Request::builder()
                .uri("/zpprepo/slides/sample.tif/ImageProperties.xml")
                .body(Body::empty())
                .unwrap();
            router.oneshot(request).await.unwrap()
        })
    };

    for _ in 0..500 {
        if entered.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(entered.load(Ordering::SeqCst), 1);

    let response = get(&router, "/zpprepo/slides/sample.tif/TileGroup0/0-0-0.jpg").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(entered.load(Ordering::SeqCst), 1);

    release.send(()).unwrap();
    let response = first.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"released");

    // The worker is free again
    release.send(()).unwrap();
    let response = get(&router, "/zpprepo/slides/sample.tif/TileGroup0/0-0-0.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
}
