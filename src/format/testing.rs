//! Little-endian tiled TIFF writer for unit tests.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

pub struct LevelSpec {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub compression: u16,
    pub samples_per_pixel: u16,
    /// One payload per tile, row-major
    pub tiles: Vec<Vec<u8>>,
    pub jpeg_tables: Option<Vec<u8>>,
}

impl LevelSpec {
    /// JPEG level whose every tile is `tile_jpeg`.
    pub fn jpeg(width: u32, height: u32, tile: u32, tile_jpeg: &[u8]) -> Self {
        let count = (width.div_ceil(tile) * height.div_ceil(tile)) as usize;
        Self {
            width,
            height,
            tile_width: tile,
            tile_height: tile,
            compression: 7,
            samples_per_pixel: 3,
            tiles: vec![tile_jpeg.to_vec(); count],
            jpeg_tables: None,
        }
    }
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Vec<u8>,
}

fn shorts(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn longs(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Write `levels` as a chain of tiled IFDs, in the given order.
pub fn build_tiff(levels: &[LevelSpec]) -> Vec<u8> {
    let mut out = vec![b'I', b'I', 42, 0, 0, 0, 0, 0];
    let mut next_pointer_at = 4usize;

    for level in levels {
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for tile in &level.tiles {
            offsets.push(out.len() as u32);
            counts.push(tile.len() as u32);
            out.extend_from_slice(tile);
        }

        let n = level.tiles.len() as u32;
        let spp = level.samples_per_pixel;
        let mut entries = vec![
            Entry { tag: 256, field_type: 4, count: 1, payload: longs(&[level.width]) },
            Entry { tag: 257, field_type: 4, count: 1, payload: longs(&[level.height]) },
            Entry { tag: 258, field_type: 3, count: spp as u32, payload: shorts(&vec![8; spp as usize]) },
            Entry { tag: 259, field_type: 3, count: 1, payload: shorts(&[level.compression]) },
            Entry { tag: 277, field_type: 3, count: 1, payload: shorts(&[spp]) },
            Entry { tag: 322, field_type: 3, count: 1, payload: shorts(&[level.tile_width as u16]) },
            Entry { tag: 323, field_type: 3, count: 1, payload: shorts(&[level.tile_height as u16]) },
            Entry { tag: 324, field_type: 4, count: n, payload: longs(&offsets) },
            Entry { tag: 325, field_type: 4, count: n, payload: longs(&counts) },
        ];
        if let Some(ref tables) = level.jpeg_tables {
            entries.push(Entry {
                tag: 347,
                field_type: 7,
                count: tables.len() as u32,
                payload: tables.clone(),
            });
        }

        let mut values = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.payload.len() <= 4 {
                let mut inline = entry.payload.clone();
                inline.resize(4, 0);
                values.push(inline);
            } else {
                values.push(longs(&[out.len() as u32]));
                out.extend_from_slice(&entry.payload);
            }
        }

        if out.len() % 2 == 1 {
            out.push(0);
        }
        let ifd_offset = out.len() as u32;
        out[next_pointer_at..next_pointer_at + 4].copy_from_slice(&ifd_offset.to_le_bytes());

        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (entry, value) in entries.iter().zip(values) {
            out.extend_from_slice(&entry.tag.to_le_bytes());
            out.extend_from_slice(&entry.field_type.to_le_bytes());
            out.extend_from_slice(&entry.count.to_le_bytes());
            out.extend_from_slice(&value);
        }
        next_pointer_at = out.len();
        out.extend_from_slice(&[0, 0, 0, 0]);
    }

    out
}

/// Baseline RGB JPEG with a gradient.
pub fn rgb_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&img)
        .expect("encode test jpeg");
    buf
}

/// Split a complete JPEG into a `JPEGTables` stream (SOI, DQT/DHT, EOI) and
/// the abbreviated remainder (SOI, other segments, scan, EOI).
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut tables = vec![0xFF, 0xD8];
    let mut rest = vec![0xFF, 0xD8];
    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        let code = jpeg[pos + 1];
        if code == 0xDA {
            rest.extend_from_slice(&jpeg[pos..]);
            break;
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let segment = &jpeg[pos..pos + 2 + len];
        if code == 0xDB || code == 0xC4 {
            tables.extend_from_slice(segment);
        } else {
            rest.extend_from_slice(segment);
        }
        pos += 2 + len;
    }
    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, rest)
}
