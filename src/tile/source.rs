//! Image sources: where the bytes of a resolved part come from.

use std::fs;

use bytes::Bytes;
use tracing::debug;

use crate::error::SourceError;
use crate::format::{PyramidEngine, PyramidHandle};
use crate::zoomify::{PartKind, ResolvedLocation, StorageKind};

use super::encoder::DEFAULT_JPEG_QUALITY;

/// Fetches the payload for a resolved location.
///
/// `Ok(None)` means the container exists but does not have the part.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, location: &ResolvedLocation) -> Result<Option<Bytes>, SourceError>;
}

/// Reads pre-cut parts straight from a file bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBundleSource;

impl ImageSource for FileBundleSource {
    fn fetch(&self, location: &ResolvedLocation) -> Result<Option<Bytes>, SourceError> {
        let data = fs::read(&location.target_path)?;
        Ok(Some(Bytes::from(data)))
    }
}

/// Extracts parts from pyramid archives.
///
/// Every fetch opens its own handle and drops it before returning, so the
/// number of open archives never exceeds the number of running workers.
#[derive(Debug, Clone)]
pub struct PyramidSource<E> {
    engine: E,
    quality: u8,
}

impl<E: PyramidEngine> PyramidSource<E> {
    pub fn new(engine: E) -> Self {
        Self::with_quality(engine, DEFAULT_JPEG_QUALITY)
    }

    pub fn with_quality(engine: E, quality: u8) -> Self {
        Self { engine, quality }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl<E: PyramidEngine> ImageSource for PyramidSource<E> {
    fn fetch(&self, location: &ResolvedLocation) -> Result<Option<Bytes>, SourceError> {
        let handle = self.engine.open(&location.target_path)?;

        let part = match (location.part_kind, location.tile) {
            (PartKind::Metadata, _) => handle.image_properties()?.map(Bytes::from),
            (PartKind::Tile, Some(coord)) => handle.tile(self.quality, coord)?,
            (PartKind::Tile, None) => None,
        };

        debug!(
            archive = %location.request_path,
            part = %location.part_id,
            found = part.is_some(),
            "Extracted part from archive"
        );
        Ok(part)
    }
}

/// Dispatches to the source matching the location's storage kind.
#[derive(Debug, Clone)]
pub struct ImageSources<E> {
    bundle: FileBundleSource,
    pyramid: PyramidSource<E>,
}

impl<E: PyramidEngine> ImageSources<E> {
    pub fn new(pyramid: PyramidSource<E>) -> Self {
        Self {
            bundle: FileBundleSource,
            pyramid,
        }
    }
}

impl<E: PyramidEngine> ImageSource for ImageSources<E> {
    fn fetch(&self, location: &ResolvedLocation) -> Result<Option<Bytes>, SourceError> {
        match location.storage_kind {
            StorageKind::FileBundle => self.bundle.fetch(location),
            StorageKind::Pyramid => self.pyramid.fetch(location),
        }
    }
}
