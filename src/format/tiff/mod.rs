//! Tiled TIFF and BigTIFF structure parsing.
//!
//! Only what a pyramid reader needs is decoded: the header, the IFD chain,
//! image and tile dimensions, compression, sample layout, the tile index
//! arrays and the shared JPEG tables. Small values live inline in their IFD
//! entry; larger ones are fetched from the offset the entry points to.

mod parser;
mod pyramid;
mod tags;
mod values;

pub use crate::error::TiffError;
pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::{parse_u64_array, ValueReader};
