//! The seam between the request pipeline and a tile-decoding engine.

use std::path::Path;

use bytes::Bytes;

use crate::error::EngineError;
use crate::zoomify::TileCoord;

/// Opens pyramid archives.
///
/// Engines are shared by all workers; handles are not.
pub trait PyramidEngine: Send + Sync {
    type Handle: PyramidHandle;

    /// Open the archive at `path`.
    fn open(&self, path: &Path) -> Result<Self::Handle, EngineError>;
}

/// An open archive. Dropping the handle closes it.
pub trait PyramidHandle {
    /// Text of `ImageProperties.xml`, or `None` when the archive has none.
    fn image_properties(&self) -> Result<Option<String>, EngineError>;

    /// JPEG bytes of one tile at `quality`, or `None` when the coordinate
    /// does not exist.
    fn tile(&self, quality: u8, coord: TileCoord) -> Result<Option<Bytes>, EngineError>;
}
