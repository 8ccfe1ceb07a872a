//! Pyramid archive parsing tests, end to end through the router.
//!
//! Tests verify:
//! - Big-endian TIFF and BigTIFF in both byte orders
//! - Non-tiled IFDs (labels, macros) are skipped
//! - Abbreviated JPEG tiles with shared JPEGTables
//! - Uncompressed tiles are encoded to JPEG
//! - Unsupported layouts fail with 500

use axum::http::StatusCode;
use axum::Router;

use super::test_utils::{
    body_bytes, body_text, build_router, create_test_rgb_jpeg, get, jpeg_dimensions,
    split_jpeg_tables, ByteOrderType, IfdBuilder, TestRepo, TiffBuilder, STANDARD_PROPERTIES,
};

const PROPERTIES_URI: &str = "/zpprepo/archive.tif/ImageProperties.xml";

fn tile_uri(level: u32, col: u32, row: u32) -> String {
    format!("/zpprepo/archive.tif/TileGroup0/{}-{}-{}.jpg", level, col, row)
}

/// Serve `tiff` as `archive.tif`. The repository must outlive the router.
fn serve(tiff: Vec<u8>) -> (TestRepo, Router) {
    let repo = TestRepo::new();
    repo.add_file("archive.tif", &tiff);
    let router = build_router(&repo);
    (repo, router)
}

fn three_levels(builder: TiffBuilder) -> TiffBuilder {
    let tile = create_test_rgb_jpeg(256, 256, 90);
    builder
        .add_ifd(IfdBuilder::tiled_jpeg(600, 400, 256, tile.clone()))
        .add_ifd(IfdBuilder::tiled_jpeg(300, 200, 256, tile.clone()))
        .add_ifd(IfdBuilder::tiled_jpeg(150, 100, 256, tile))
}

async fn assert_standard_pyramid(router: &Router) {
    let response = get(router, PROPERTIES_URI).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, STANDARD_PROPERTIES);

    let response = get(router, &tile_uri(2, 2, 1)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(jpeg_dimensions(&body_bytes(response).await), (88, 144));

    let response = get(router, &tile_uri(1, 1, 0)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(jpeg_dimensions(&body_bytes(response).await), (44, 200));
}

// =============================================================================
// Container Variants
// =============================================================================

#[tokio::test]
async fn test_big_endian_tiff() {
    let tiff = three_levels(TiffBuilder::new().with_byte_order(ByteOrderType::BigEndian)).build();
    let (_repo, router) = serve(tiff);

    assert_standard_pyramid(&router).await;
}

#[tokio::test]
async fn test_bigtiff_little_endian() {
    let tiff = three_levels(TiffBuilder::new().with_bigtiff(true)).build();
    let (_repo, router) = serve(tiff);

    assert_standard_pyramid(&router).await;
}

#[tokio::test]
async fn test_bigtiff_big_endian() {
    let tiff = three_levels(
        TiffBuilder::new()
            .with_bigtiff(true)
            .with_byte_order(ByteOrderType::BigEndian),
    )
    .build();
    let (_repo, router) = serve(tiff);

    assert_standard_pyramid(&router).await;
}

// =============================================================================
// Level Selection
// =============================================================================

#[tokio::test]
async fn test_stripped_images_are_skipped() {
    let tile = create_test_rgb_jpeg(256, 256, 90);
    let tiff = TiffBuilder::new()
        .add_ifd(IfdBuilder::tiled_jpeg(600, 400, 256, tile.clone()))
        .add_ifd(IfdBuilder::stripped(400, 300))
        .add_ifd(IfdBuilder::tiled_jpeg(300, 200, 256, tile.clone()))
        .add_ifd(IfdBuilder::tiled_jpeg(150, 100, 256, tile))
        .add_ifd(IfdBuilder::stripped(100, 100))
        .build();
    let (_repo, router) = serve(tiff);

    assert_standard_pyramid(&router).await;
}

#[tokio::test]
async fn test_levels_below_one_tile_are_ignored() {
    let tile = create_test_rgb_jpeg(256, 256, 90);
    let tiff = three_levels(TiffBuilder::new())
        .add_ifd(IfdBuilder::tiled_jpeg(75, 50, 256, tile))
        .build();
    let (_repo, router) = serve(tiff);

    assert_standard_pyramid(&router).await;
    let response = get(&router, &tile_uri(3, 0, 0)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_levels_in_any_ifd_order() {
    let tile = create_test_rgb_jpeg(256, 256, 90);
    let tiff = TiffBuilder::new()
        .add_ifd(IfdBuilder::tiled_jpeg(150, 100, 256, tile.clone()))
        .add_ifd(IfdBuilder::tiled_jpeg(600, 400, 256, tile.clone()))
        .add_ifd(IfdBuilder::tiled_jpeg(300, 200, 256, tile))
        .build();
    let (_repo, router) = serve(tiff);

    assert_standard_pyramid(&router).await;
}

// =============================================================================
// Tile Encodings
// =============================================================================

#[tokio::test]
async fn test_abbreviated_tiles_with_jpeg_tables() {
    let (tables, abbreviated) = split_jpeg_tables(&create_test_rgb_jpeg(256, 256, 90));
    let tiff = TiffBuilder::new()
        .add_ifd(
            IfdBuilder::tiled_jpeg(512, 256, 256, abbreviated).with_jpeg_tables(tables),
        )
        .build();
    let (_repo, router) = serve(tiff);

    let response = get(&router, &tile_uri(0, 1, 0)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(jpeg_dimensions(&body_bytes(response).await), (256, 256));
}

#[tokio::test]
async fn test_uncompressed_tiles_are_encoded() {
    let tiff = TiffBuilder::new()
        .add_ifd(IfdBuilder::tiled_raw_rgb(20, 20, 16, 200))
        .build();
    let (_repo, router) = serve(tiff);

    let response = get(&router, PROPERTIES_URI).await;
    assert_eq!(
        body_text(response).await,
        "<IMAGE_PROPERTIES WIDTH=\"20\" HEIGHT=\"20\" NUMTILES=\"4\" NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"16\" />\n"
    );

    let response = get(&router, &tile_uri(0, 0, 0)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(jpeg_dimensions(&body_bytes(response).await), (16, 16));

    let response = get(&router, &tile_uri(0, 1, 1)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(jpeg_dimensions(&body_bytes(response).await), (4, 4));
}

#[tokio::test]
async fn test_sparse_tile_is_not_found() {
    let tile = create_test_rgb_jpeg(256, 256, 90);
    let tiff = TiffBuilder::new()
        .add_ifd(
            IfdBuilder::tiled_jpeg(512, 256, 256, tile.clone()).with_tiles(vec![tile, Vec::new()]),
        )
        .build();
    let (_repo, router) = serve(tiff);

    assert_eq!(get(&router, &tile_uri(0, 0, 0)).await.status(), StatusCode::OK);
    assert_eq!(
        get(&router, &tile_uri(0, 1, 0)).await.status(),
        StatusCode::NOT_FOUND
    );
}

// =============================================================================
// Unsupported Archives
// =============================================================================

#[tokio::test]
async fn test_unsupported_compression() {
    let tile = create_test_rgb_jpeg(256, 256, 90);
    let tiff = TiffBuilder::new()
        .add_ifd(IfdBuilder::tiled_jpeg(256, 256, 256, tile).with_compression(5))
        .build();
    let (_repo, router) = serve(tiff);

    // The descriptor only needs the geometry
    let response = get(&router, PROPERTIES_URI).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, &tile_uri(0, 0, 0)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_non_square_tiles() {
    let tile = create_test_rgb_jpeg(256, 128, 90);
    let tiff = TiffBuilder::new()
        .add_ifd(IfdBuilder::tiled_jpeg(512, 512, 256, tile).with_tile_size(256, 128))
        .build();
    let (_repo, router) = serve(tiff);

    let response = get(&router, PROPERTIES_URI).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_no_tiled_images() {
    let tiff = TiffBuilder::new()
        .add_ifd(IfdBuilder::stripped(640, 480))
        .build();
    let (_repo, router) = serve(tiff);

    let response = get(&router, PROPERTIES_URI).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
