//! Pyramid archive support.
//!
//! [`PyramidEngine`] and [`PyramidHandle`] are the interface the request
//! pipeline talks to. [`TiffPyramidEngine`] implements them for tiled
//! pyramidal TIFF, using the parsers in [`tiff`] and the JPEG helpers in
//! [`jpeg`].

mod engine;
pub mod jpeg;
#[cfg(test)]
pub(crate) mod testing;
pub mod tiff;
mod tiff_engine;

pub use engine::{PyramidEngine, PyramidHandle};
pub use jpeg::{is_abbreviated_stream, is_complete_stream, merge_jpeg_tables, prepare_tile_jpeg};
pub use tiff_engine::{TiffPyramidEngine, TiffPyramidHandle};
