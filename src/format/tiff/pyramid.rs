//! Pyramid level identification.
//!
//! Every tiled IFD carrying tile offsets and byte counts is a candidate.
//! Candidates are ordered largest-first. A level is kept only if it is
//! strictly smaller than the previous one and uses the base tile size.
//! Collection stops at the first level that fits in a single tile, which is
//! where the Zoomify pyramid bottoms out.

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

/// Upper bound on IFDs followed in one file
const MAX_IFDS: usize = 100;

/// One resolution of the image.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Position of the source IFD in the file's chain
    pub ifd_index: usize,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub compression: Compression,
    pub samples_per_pixel: u16,
    pub bits_per_sample: u16,
    /// 1 = chunky, 2 = planar
    pub planar_configuration: u16,
    pub tile_offsets_entry: IfdEntry,
    pub tile_byte_counts_entry: IfdEntry,
    pub jpeg_tables_entry: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD.
    ///
    /// Returns `Ok(None)` for IFDs that are not tiled or lack tile data.
    fn from_ifd<R: RangeReader + ?Sized>(
        ifd: &Ifd,
        ifd_index: usize,
        header: &TiffHeader,
        reader: &R,
    ) -> Result<Option<Self>, TiffError> {
        let byte_order = header.byte_order;

        if !ifd.is_tiled() {
            return Ok(None);
        }
        let (Some(tile_offsets_entry), Some(tile_byte_counts_entry)) = (
            ifd.entry(TiffTag::TileOffsets).cloned(),
            ifd.entry(TiffTag::TileByteCounts).cloned(),
        ) else {
            return Ok(None);
        };

        let width = ifd
            .image_width(byte_order)
            .ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = ifd
            .image_height(byte_order)
            .ok_or(TiffError::MissingTag("ImageLength"))?;
        let tile_width = ifd
            .tile_width(byte_order)
            .ok_or(TiffError::MissingTag("TileWidth"))?;
        let tile_height = ifd
            .tile_height(byte_order)
            .ok_or(TiffError::MissingTag("TileLength"))?;

        if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: "ImageWidth",
                message: format!(
                    "zero dimension in {}x{} image with {}x{} tiles",
                    width, height, tile_width, tile_height
                ),
            });
        }

        let compression = Compression::from_u16(
            ifd.get_u32(TiffTag::Compression, byte_order).unwrap_or(1) as u16,
        );
        let samples_per_pixel =
            ifd.get_u32(TiffTag::SamplesPerPixel, byte_order).unwrap_or(1) as u16;
        let planar_configuration = ifd
            .get_u32(TiffTag::PlanarConfiguration, byte_order)
            .unwrap_or(1) as u16;

        // BitsPerSample has one value per sample, so RGB images store it out of line.
        let bits_per_sample = match ifd.entry(TiffTag::BitsPerSample) {
            Some(entry) => ValueReader::new(reader, header)
                .read_u64_array(entry)?
                .first()
                .copied()
                .unwrap_or(1) as u16,
            None => 1,
        };

        Ok(Some(PyramidLevel {
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            compression,
            samples_per_pixel,
            bits_per_sample,
            planar_configuration,
            tile_offsets_entry,
            tile_byte_counts_entry,
            jpeg_tables_entry: ifd.entry(TiffTag::JpegTables).cloned(),
        }))
    }

    pub fn tile_count(&self) -> u64 {
        self.tiles_x as u64 * self.tiles_y as u64
    }

    /// Whether the whole level fits inside one tile.
    pub fn fits_in_one_tile(&self) -> bool {
        self.width <= self.tile_width && self.height <= self.tile_height
    }

    /// Row-major tile index, `None` when out of range.
    pub fn tile_index(&self, col: u32, row: u32) -> Option<u64> {
        if col >= self.tiles_x || row >= self.tiles_y {
            return None;
        }
        Some(row as u64 * self.tiles_x as u64 + col as u64)
    }

    /// Pixel extent of a tile clipped to the image; edge tiles are smaller.
    pub fn tile_dimensions(&self, col: u32, row: u32) -> Option<(u32, u32)> {
        if col >= self.tiles_x || row >= self.tiles_y {
            return None;
        }
        let w = (self.width - col * self.tile_width).min(self.tile_width);
        let h = (self.height - row * self.tile_height).min(self.tile_height);
        Some((w, h))
    }
}

/// The pyramid of a tiled TIFF, largest level first.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,
    pub levels: Vec<PyramidLevel>,
}

impl TiffPyramid {
    /// Parse the header and IFD chain and identify the pyramid levels.
    ///
    /// Fails if no tiled level exists or if the base level's tiles are not
    /// square.
    pub fn parse<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let header_len = BIGTIFF_HEADER_SIZE.min(reader.size() as usize);
        let header_bytes = reader.read_exact_at(0, header_len)?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::parse_all_ifds(reader, &header)?;

        let mut candidates = Vec::new();
        for (ifd_index, ifd) in ifds.iter().enumerate() {
            if let Some(level) = PyramidLevel::from_ifd(ifd, ifd_index, &header, reader)? {
                candidates.push(level);
            }
        }

        let levels = Self::select_levels(candidates)?;
        Ok(TiffPyramid { header, levels })
    }

    fn parse_all_ifds<R: RangeReader + ?Sized>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if offset >= reader.size() || !seen.insert(offset) {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_bytes = reader.read_exact_at(offset, header.ifd_count_size())?;
            let entry_count = Ifd::read_entry_count(&count_bytes, header);
            let ifd_size = Ifd::calculate_size(entry_count, header)?;
            let available = reader.size() - offset;
            if ifd_size as u64 > available {
                return Err(TiffError::FileTooSmall {
                    required: offset.saturating_add(ifd_size as u64),
                    actual: reader.size(),
                });
            }
            let ifd_bytes = reader.read_exact_at(offset, ifd_size)?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    fn select_levels(mut candidates: Vec<PyramidLevel>) -> Result<Vec<PyramidLevel>, TiffError> {
        candidates.sort_by(|a, b| {
            let area_a = a.width as u64 * a.height as u64;
            let area_b = b.width as u64 * b.height as u64;
            area_b.cmp(&area_a)
        });

        let mut candidates = candidates.into_iter();
        let base = candidates.next().ok_or(TiffError::NoTiledLevels)?;
        if base.tile_width != base.tile_height {
            return Err(TiffError::NonSquareTiles {
                width: base.tile_width,
                height: base.tile_height,
            });
        }

        let mut done = base.fits_in_one_tile();
        let mut levels = vec![base];
        for level in candidates {
            if done {
                break;
            }
            let Some(prev) = levels.last() else { break };
            let shrinks = level.width <= prev.width
                && level.height <= prev.height
                && (level.width < prev.width || level.height < prev.height);
            if !shrinks || level.tile_width != prev.tile_width || level.tile_height != prev.tile_height
            {
                continue;
            }
            done = level.fits_in_one_tile();
            levels.push(level);
        }

        Ok(levels)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn base_level(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    /// Tiles across every level.
    pub fn total_tiles(&self) -> u64 {
        self.levels.iter().map(PyramidLevel::tile_count).sum()
    }
}

/// Tile index arrays and JPEG tables of one level.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    pub fn load<R: RangeReader + ?Sized>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets = values.read_u64_array(&level.tile_offsets_entry)?;
        let byte_counts = values.read_u64_array(&level.tile_byte_counts_entry)?;
        let jpeg_tables = match level.jpeg_tables_entry {
            Some(ref entry) => Some(values.read_bytes(entry)?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// `(offset, byte_count)` of a tile.
    pub fn tile_location(&self, tile_index: u64) -> Option<(u64, u64)> {
        let idx = usize::try_from(tile_index).ok()?;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}
