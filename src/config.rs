//! Configuration management for Zoomify Streamer.
//!
//! Settings come from command-line arguments via clap, fall back to
//! environment variables with the `ZOOMIFY_` prefix, and otherwise use the
//! defaults below.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use zoomify_streamer::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Serving {}", config.repo_root.display()),
//!     Command::Check(_) | Command::Extract(_) => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `ZOOMIFY_REPO_ROOT` - Repository root directory (default: ../testrepo)
//! - `ZOOMIFY_HOST` - Server bind address (default: 0.0.0.0)
//! - `ZOOMIFY_PORT` - Server port (default: 8080)
//! - `ZOOMIFY_MOUNT` - URL prefix for the repository (default: /zpprepo)
//! - `ZOOMIFY_WORKERS` - Concurrent pipeline workers (default: 50)
//! - `ZOOMIFY_QUEUE_DEPTH` - Requests allowed to wait for a worker (default: 200)
//! - `ZOOMIFY_CACHE_BYTES` - Tile cache budget in bytes (default: 100MB)
//! - `ZOOMIFY_CACHE_ENTRIES` - Tile cache entry cap (default: 10000)
//! - `ZOOMIFY_JPEG_QUALITY` - Quality for re-encoded tiles (default: 85)
//! - `ZOOMIFY_CACHE_MAX_AGE` - HTTP max-age and Expires offset in seconds (default: 86400)
//! - `ZOOMIFY_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::server::{DEFAULT_MOUNT, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS};
use crate::tile::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_ENTRIES, DEFAULT_TILE_CACHE_CAPACITY,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default repository root, relative to the working directory.
pub const DEFAULT_REPO_ROOT: &str = "../testrepo";

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Zoomify Streamer - serves Zoomify tiles from file bundles and pyramid
/// TIFF archives on local storage.
///
/// Runs the server when no subcommand is given.
#[derive(Parser, Debug, Clone)]
#[command(name = "zoomify-streamer")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The subcommand to run, `serve` when none was given.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the tile server.
    Serve(ServeConfig),

    /// Validate the repository root and list the containers in it.
    Check(CheckConfig),

    /// Write one part of a pyramid archive to a file or stdout.
    Extract(ExtractConfig),
}

/// Settings for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Repository
    // =========================================================================
    /// Directory containing file bundles and pyramid archives.
    #[arg(long, default_value = DEFAULT_REPO_ROOT, env = "ZOOMIFY_REPO_ROOT")]
    pub repo_root: PathBuf,

    // =========================================================================
    // Server
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "ZOOMIFY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "ZOOMIFY_PORT")]
    pub port: u16,

    /// URL prefix the repository is served under.
    #[arg(long, default_value = DEFAULT_MOUNT, env = "ZOOMIFY_MOUNT")]
    pub mount: String,

    /// Requests processed concurrently.
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "ZOOMIFY_WORKERS")]
    pub workers: usize,

    /// Requests allowed to wait for a worker before the server answers 503.
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH, env = "ZOOMIFY_QUEUE_DEPTH")]
    pub queue_depth: usize,

    // =========================================================================
    // Caching
    // =========================================================================
    /// Tile cache budget in bytes.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "ZOOMIFY_CACHE_BYTES")]
    pub cache_bytes: usize,

    /// Maximum number of cached parts.
    #[arg(long, default_value_t = DEFAULT_MAX_ENTRIES, env = "ZOOMIFY_CACHE_ENTRIES")]
    pub cache_entries: usize,

    /// HTTP Cache-Control max-age and Expires offset, in seconds.
    #[arg(long, default_value_t = DEFAULT_MAX_AGE_SECS, env = "ZOOMIFY_CACHE_MAX_AGE")]
    pub cache_max_age: u64,

    // =========================================================================
    // Tiles
    // =========================================================================
    /// JPEG quality for tiles that have to be re-encoded (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "ZOOMIFY_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // CORS
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "ZOOMIFY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    ///
    /// The repository root itself is checked when it is opened.
    pub fn validate(&self) -> Result<(), String> {
        if !self.mount.starts_with('/') {
            return Err(format!("mount must start with '/', got '{}'", self.mount));
        }
        if self.mount.contains(['{', '}', '*']) {
            return Err(format!("mount contains route syntax: '{}'", self.mount));
        }
        if self.mount.trim_end_matches('/') == "/view" {
            return Err("mount '/view' is reserved for the viewer".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.cache_entries == 0 {
            return Err("cache_entries must be greater than 0".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for `check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Directory containing file bundles and pyramid archives.
    #[arg(long, default_value = DEFAULT_REPO_ROOT, env = "ZOOMIFY_REPO_ROOT")]
    pub repo_root: PathBuf,

    /// Also open every pyramid archive and report its dimensions.
    #[arg(long, default_value_t = false)]
    pub open_archives: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Settings for `extract`.
#[derive(Args, Debug, Clone)]
pub struct ExtractConfig {
    /// Pyramid archive to read.
    pub archive: PathBuf,

    /// Part to extract: `ImageProperties.xml` or `<level>-<col>-<row>.jpg`.
    pub part: String,

    /// Output file. Writes to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JPEG quality for tiles that have to be re-encoded (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "ZOOMIFY_JPEG_QUALITY")]
    pub jpeg_quality: u8,
}

// =============================================================================
// Tests
// =============================================================================
