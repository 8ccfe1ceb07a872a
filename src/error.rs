use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading byte ranges from local storage
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The underlying read or seek failed
    #[error("Read failed for {identifier}: {message}")]
    Read { identifier: String, message: String },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// IFD offset points outside the file
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Field type the parser cannot size
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Tile compression other than JPEG or none
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(u16),

    /// No IFD in the file is tiled
    #[error("No tiled image found in file")]
    NoTiledLevels,

    /// Zoomify addressing needs square tiles
    #[error("Tiles must be square, got {width}x{height}")]
    NonSquareTiles { width: u32, height: u32 },
}

/// Errors raised by a pyramid engine while opening an archive or producing a part
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Archive structure could not be read
    #[error(transparent)]
    Tiff(#[from] TiffError),

    /// Tile data could not be decoded
    #[error("Failed to decode tile: {message}")]
    Decode { message: String },

    /// Tile could not be re-encoded
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },
}

impl From<IoError> for EngineError {
    fn from(err: IoError) -> Self {
        EngineError::Tiff(TiffError::Io(err))
    }
}

/// Underlying cause of a failed fetch from an image source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading a file bundle part failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pyramid engine failed to open the archive or produce the part
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Request-level errors.
///
/// Each variant carries the raw path the client asked for. Canonical server
/// paths and underlying causes are kept out of the `Display` output so they
/// never reach a response body.
#[derive(Debug, Error)]
pub enum ZoomifyError {
    /// The path matches neither the metadata nor the tile grammar
    #[error("Invalid Zoomify path: {path}")]
    InvalidPathFormat { path: String },

    /// The container or the part does not exist
    #[error("Not found: {path}")]
    PartNotFound { path: String },

    /// The path resolves outside the repository root
    #[error("Access denied: {path}")]
    SecurityViolation { path: String },

    /// The container exists but its bytes could not be produced
    #[error("Failed to read: {path}")]
    SourceReadFailure {
        path: String,
        #[source]
        source: SourceError,
    },
}

impl ZoomifyError {
    /// Raw request path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            ZoomifyError::InvalidPathFormat { path }
            | ZoomifyError::PartNotFound { path }
            | ZoomifyError::SecurityViolation { path }
            | ZoomifyError::SourceReadFailure { path, .. } => path,
        }
    }
}

/// Errors establishing the repository root at startup
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Repository root does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Repository root is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Failed to access repository root {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
