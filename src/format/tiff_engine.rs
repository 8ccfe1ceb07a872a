//! Zoomify parts produced from a tiled pyramidal TIFF.
//!
//! Zoomify numbers levels from the smallest (0) up, TIFF stores the largest
//! first, so Zoomify level `r` is pyramid level `levels - 1 - r`.

use std::path::Path;

use bytes::Bytes;
use tracing::trace;

use super::engine::{PyramidEngine, PyramidHandle};
use super::jpeg::prepare_tile_jpeg;
use super::tiff::{Compression, PyramidLevel, TiffError, TiffPyramid, TileData};
use crate::error::EngineError;
use crate::io::{FileRangeReader, RangeReader};
use crate::tile::JpegTileEncoder;
use crate::zoomify::{TileCoord, ZoomifyProperties};

/// Engine for tiled TIFF and BigTIFF pyramids on local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffPyramidEngine {
    encoder: JpegTileEncoder,
}

impl TiffPyramidEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PyramidEngine for TiffPyramidEngine {
    type Handle = TiffPyramidHandle<FileRangeReader>;

    fn open(&self, path: &Path) -> Result<Self::Handle, EngineError> {
        let reader = FileRangeReader::open(path)?;
        TiffPyramidHandle::from_reader(reader, self.encoder)
    }
}

/// An open pyramid. Owns its reader, so dropping the handle closes the file.
#[derive(Debug)]
pub struct TiffPyramidHandle<R: RangeReader> {
    reader: R,
    pyramid: TiffPyramid,
    encoder: JpegTileEncoder,
}

impl<R: RangeReader> TiffPyramidHandle<R> {
    /// Parse the pyramid structure behind `reader`.
    pub fn from_reader(reader: R, encoder: JpegTileEncoder) -> Result<Self, EngineError> {
        let pyramid = TiffPyramid::parse(&reader)?;
        trace!(
            archive = reader.identifier(),
            levels = pyramid.level_count(),
            "Opened pyramid"
        );
        Ok(Self {
            reader,
            pyramid,
            encoder,
        })
    }

    pub fn pyramid(&self) -> &TiffPyramid {
        &self.pyramid
    }

    /// Descriptor values for the archive.
    pub fn properties(&self) -> Option<ZoomifyProperties> {
        let base = self.pyramid.base_level()?;
        Some(ZoomifyProperties {
            width: base.width,
            height: base.height,
            num_tiles: self.pyramid.total_tiles(),
            tile_size: base.tile_width,
        })
    }

    fn level_for(&self, zoom_level: u32) -> Option<&PyramidLevel> {
        let count = self.pyramid.level_count();
        let zoom_level = usize::try_from(zoom_level).ok()?;
        if zoom_level >= count {
            return None;
        }
        self.pyramid.levels.get(count - 1 - zoom_level)
    }

    fn encode_tile(
        &self,
        level: &PyramidLevel,
        raw: &[u8],
        jpeg_tables: Option<&[u8]>,
        extent: (u32, u32),
        quality: u8,
    ) -> Result<Bytes, EngineError> {
        let (width, height) = extent;
        let full_size = extent == (level.tile_width, level.tile_height);

        match level.compression {
            Compression::Jpeg => {
                let jpeg = prepare_tile_jpeg(jpeg_tables, raw);
                if full_size {
                    Ok(jpeg)
                } else {
                    self.encoder.crop_jpeg(&jpeg, width, height, quality)
                }
            }
            Compression::None => {
                if level.bits_per_sample != 8 || level.planar_configuration != 1 {
                    return Err(EngineError::Decode {
                        message: format!(
                            "unsupported raw layout: {} bits per sample, planar configuration {}",
                            level.bits_per_sample, level.planar_configuration
                        ),
                    });
                }
                self.encoder.encode_samples(
                    raw,
                    level.tile_width,
                    level.tile_height,
                    level.samples_per_pixel,
                    width,
                    height,
                    quality,
                )
            }
            Compression::Other(code) => Err(TiffError::UnsupportedCompression(code).into()),
        }
    }
}

impl<R: RangeReader> PyramidHandle for TiffPyramidHandle<R> {
    fn image_properties(&self) -> Result<Option<String>, EngineError> {
        Ok(self.properties().map(|props| props.to_xml()))
    }

    fn tile(&self, quality: u8, coord: TileCoord) -> Result<Option<Bytes>, EngineError> {
        let Some(level) = self.level_for(coord.level) else {
            return Ok(None);
        };
        let (Some(index), Some(extent)) = (
            level.tile_index(coord.col, coord.row),
            level.tile_dimensions(coord.col, coord.row),
        ) else {
            return Ok(None);
        };

        let data = TileData::load(&self.reader, level, &self.pyramid.header)?;
        let Some((offset, byte_count)) = data.tile_location(index) else {
            return Ok(None);
        };
        // Sparse archives leave unwritten tiles at zero length.
        if byte_count == 0 {
            return Ok(None);
        }

        let len = usize::try_from(byte_count).map_err(|_| TiffError::InvalidTagValue {
            tag: "TileByteCounts",
            message: format!("tile of {} bytes is too large", byte_count),
        })?;
        let raw = self.reader.read_exact_at(offset, len)?;

        self.encode_tile(level, &raw, data.jpeg_tables.as_deref(), extent, quality)
            .map(Some)
    }
}
