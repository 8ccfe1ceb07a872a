//! JPEG-in-TIFF stream handling.
//!
//! Tiled TIFF writers usually store each tile as an abbreviated JPEG stream:
//! the quantization (DQT) and Huffman (DHT) tables live once in the
//! `JPEGTables` tag and the tiles carry only frame and scan data. Before a
//! tile can be served or decoded on its own the two are spliced together:
//!
//! ```text
//! tables: SOI DQT DHT EOI
//! tile:   SOI SOF SOS <scan> EOI
//! merged: SOI DQT DHT SOF SOS <scan> EOI
//! ```

use bytes::{Bytes, BytesMut};

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const DHT: u8 = 0xC4;
pub const DQT: u8 = 0xDB;
pub const SOS: u8 = 0xDA;

/// Marker codes of the header segments, stopping at the first SOS.
///
/// Returns `None` when the data does not start with SOI.
fn header_markers(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 4 || data[..2] != SOI {
        return None;
    }

    let mut markers = Vec::new();
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let code = data[pos + 1];
        // Fill bytes and standalone markers carry no length.
        if code == 0xFF || code == 0x00 || code == 0x01 || (0xD0..=0xD9).contains(&code) {
            pos += 2;
            continue;
        }
        markers.push(code);
        if code == SOS || pos + 3 >= data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 2 + length;
    }
    Some(markers)
}

/// True when the stream reaches its scan without defining any tables.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    match header_markers(data) {
        Some(markers) => {
            markers.last() == Some(&SOS) && !markers.iter().any(|&m| m == DQT || m == DHT)
        }
        None => false,
    }
}

/// True when the stream defines quantization tables before its scan.
pub fn is_complete_stream(data: &[u8]) -> bool {
    header_markers(data).is_some_and(|markers| markers.contains(&DQT))
}

/// Splice `JPEGTables` into an abbreviated tile stream.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }
    if tile_data.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI[..]).unwrap_or(tables);
    let tile = tile_data.strip_prefix(&SOI[..]).unwrap_or(tile_data);

    let mut merged = BytesMut::with_capacity(tables.len() + tile.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(tile);
    merged.freeze()
}

/// Produce a self-contained JPEG for a tile, merging tables when the tile
/// needs them. Anything else is returned unchanged.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8]) -> Bytes {
    match tables {
        Some(tables) if !is_complete_stream(tile_data) && is_abbreviated_stream(tile_data) => {
            merge_jpeg_tables(tables, tile_data)
        }
        _ => Bytes::copy_from_slice(tile_data),
    }
}
