//! Zoomify path grammar.
//!
//! Two shapes are recognised, tried in order, case-insensitively:
//!
//! ```text
//! <prefix>/ImageProperties.xml
//! <prefix>/TileGroup<n>/<level>-<col>-<row>.jpg
//! ```
//!
//! `<prefix>` must end in a non-empty segment. The `TileGroup<n>` segment is
//! not interpreted: pyramid archives compute tiles from the coordinates alone.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Part id of the metadata descriptor.
pub const IMAGE_PROPERTIES: &str = "ImageProperties.xml";

/// What a Zoomify path addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// `ImageProperties.xml`
    Metadata,
    /// `<level>-<col>-<row>.jpg`
    Tile,
}

impl PartKind {
    pub fn content_type(self) -> &'static str {
        match self {
            PartKind::Metadata => "text/xml",
            PartKind::Tile => "image/jpeg",
        }
    }
}

/// Tile address in Zoomify terms. Level 0 is the smallest resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub level: u32,
    pub col: u32,
    pub row: u32,
}

impl TileCoord {
    pub fn new(level: u32, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }

    /// Parse `<level>-<col>-<row>.jpg`. The extension is matched case-insensitively.
    pub fn from_part_id(part_id: &str) -> Option<Self> {
        let stem = part_id
            .len()
            .checked_sub(4)
            .filter(|&split| part_id.is_char_boundary(split))
            .filter(|&split| part_id[split..].eq_ignore_ascii_case(".jpg"))
            .map(|split| &part_id[..split])?;

        let mut parts = stem.split('-');
        let level = parts.next()?.parse().ok()?;
        let col = parts.next()?.parse().ok()?;
        let row = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { level, col, row })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}.jpg", self.level, self.col, self.row)
    }
}

/// A raw path split by the grammar, before any filesystem access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomifyPath {
    /// Container prefix exactly as it appeared in the request
    pub container: String,
    pub part_kind: PartKind,
    pub part_id: String,
    /// Present for tiles
    pub tile: Option<TileCoord>,
}

fn grammar() -> &'static [(Regex, PartKind)] {
    static GRAMMAR: OnceLock<Vec<(Regex, PartKind)>> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        [
            (r"(?i)^(.*/[^/]+)/ImageProperties\.xml$", PartKind::Metadata),
            (
                r"(?i)^(.*/[^/]+)/TileGroup[0-9]+/([0-9]+-[0-9]+-[0-9]+\.jpg)$",
                PartKind::Tile,
            ),
        ]
        .into_iter()
        .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, kind)))
        .collect()
    })
}

/// Match `raw` against the grammar. The first matching rule wins.
///
/// Returns `None` when no rule matches or a tile coordinate does not fit
/// in a `u32`.
pub fn parse_zoomify_path(raw: &str) -> Option<ZoomifyPath> {
    grammar().iter().find_map(|(pattern, kind)| {
        let caps = pattern.captures(raw)?;
        let container = caps.get(1)?.as_str().to_string();
        match kind {
            PartKind::Metadata => Some(ZoomifyPath {
                container,
                part_kind: PartKind::Metadata,
                part_id: IMAGE_PROPERTIES.to_string(),
                tile: None,
            }),
            PartKind::Tile => {
                let part_id = caps.get(2)?.as_str();
                let coord = TileCoord::from_part_id(part_id)?;
                Some(ZoomifyPath {
                    container,
                    part_kind: PartKind::Tile,
                    part_id: part_id.to_string(),
                    tile: Some(coord),
                })
            }
        }
    })
}
