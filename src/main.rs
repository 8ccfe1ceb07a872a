//! Zoomify Streamer - a Zoomify tile server for local image repositories.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zoomify_streamer::{
    config::{CheckConfig, Cli, Command, ExtractConfig, ServeConfig},
    format::{PyramidEngine, PyramidHandle, TiffPyramidEngine},
    server::{create_router, RouterConfig},
    tile::{FreshnessPolicy, ImageSources, PyramidSource, RequestPipeline, TileCache},
    zoomify::{RepositoryContext, StorageKind, TileCoord, IMAGE_PROPERTIES},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config),
        Command::Extract(config) => run_extract(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let repo = match RepositoryContext::open(&config.repo_root) {
        Ok(repo) => Arc::new(repo),
        Err(e) => {
            error!("{}", e);
            error!("Set --repo-root or ZOOMIFY_REPO_ROOT to an existing directory");
            return ExitCode::FAILURE;
        }
    };

    info!("Zoomify Streamer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Repository: {}", repo.root().display());
    info!("  Mount: {}", config.mount);
    info!(
        "  Workers: {} (queue depth {})",
        config.workers, config.queue_depth
    );
    info!(
        "  Cache: {}MB, {} entries, max-age {}s",
        config.cache_bytes / (1024 * 1024),
        config.cache_entries,
        config.cache_max_age
    );
    info!("  JPEG quality: {}", config.jpeg_quality);
    if config.cors_origins.is_none() {
        warn!("  CORS: any origin");
    }

    let cache = Arc::new(TileCache::with_capacity_and_entries(
        config.cache_bytes,
        config.cache_entries,
    ));
    let sources = ImageSources::new(PyramidSource::with_quality(
        TiffPyramidEngine::new(),
        config.jpeg_quality,
    ));
    let pipeline = RequestPipeline::new(repo, cache, sources)
        .with_freshness(FreshnessPolicy::new(config.cache_max_age));

    let router = create_router(pipeline, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let mount = config.mount.trim_end_matches('/');
    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}{}/<container>/ImageProperties.xml", addr, mount);
    info!("    open http://{}/view/<container>", addr);
    info!("");

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, draining connections");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "zoomify_streamer=debug,tower_http=debug"
    } else {
        "zoomify_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new(config.mount.clone())
        .with_workers(config.workers, config.queue_depth)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Zoomify Streamer Repository Check");
    println!("═════════════════════════════════");
    println!();

    let repo = match RepositoryContext::open(&config.repo_root) {
        Ok(repo) => {
            println!("✓ Repository: {}", repo.root().display());
            repo
        }
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let containers = match repo.discover_containers() {
        Ok(containers) => containers,
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("Containers:");
    println!("───────────");
    if containers.is_empty() {
        println!("  (no containers found)");
    }

    let engine = TiffPyramidEngine::new();
    let mut failures = 0usize;
    for container in &containers {
        let kind = match container.kind {
            StorageKind::FileBundle => "bundle ",
            StorageKind::Pyramid => "pyramid",
        };
        let path = container.relative_path.display();

        if config.open_archives && container.kind == StorageKind::Pyramid {
            match engine.open(&repo.root().join(&container.relative_path)) {
                Ok(handle) => match handle.properties() {
                    Some(props) => println!(
                        "  {}  {}  ({}x{}, {} tiles of {}px)",
                        kind, path, props.width, props.height, props.num_tiles, props.tile_size
                    ),
                    None => println!("  {}  {}  (no levels)", kind, path),
                },
                Err(e) => {
                    failures += 1;
                    println!("  {}  {}  ✗ {}", kind, path, e);
                }
            }
        } else {
            println!("  {}  {}", kind, path);
        }
    }

    println!();
    println!("Total: {} container(s)", containers.len());
    println!("═════════════════════════════════");

    if failures > 0 {
        println!("✗ {} archive(s) could not be opened", failures);
        return ExitCode::FAILURE;
    }
    println!("✓ All checks passed!");
    ExitCode::SUCCESS
}

// =============================================================================
// Extract Command
// =============================================================================

fn run_extract(config: ExtractConfig) -> ExitCode {
    if config.jpeg_quality == 0 || config.jpeg_quality > 100 {
        eprintln!("Error: jpeg_quality must be between 1 and 100");
        return ExitCode::FAILURE;
    }

    let handle = match TiffPyramidEngine::new().open(&config.archive) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: {}: {}", config.archive.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let part = if config.part.eq_ignore_ascii_case(IMAGE_PROPERTIES) {
        handle
            .image_properties()
            .map(|props| props.map(|text| text.into_bytes()))
    } else if let Some(coord) = TileCoord::from_part_id(&config.part) {
        handle
            .tile(config.jpeg_quality, coord)
            .map(|tile| tile.map(|bytes| bytes.to_vec()))
    } else {
        eprintln!(
            "Error: part must be {} or <level>-<col>-<row>.jpg, got '{}'",
            IMAGE_PROPERTIES, config.part
        );
        return ExitCode::FAILURE;
    };

    let data = match part {
        Ok(Some(data)) => data,
        Ok(None) => {
            eprintln!("Error: {} has no part {}", config.archive.display(), config.part);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let written = match config.output {
        Some(ref path) => std::fs::write(path, &data),
        None => std::io::stdout().lock().write_all(&data),
    };
    if let Err(e) = written {
        eprintln!("Error: failed to write output: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(ref path) = config.output {
        eprintln!("Wrote {} bytes to {}", data.len(), path.display());
    }
    ExitCode::SUCCESS
}
