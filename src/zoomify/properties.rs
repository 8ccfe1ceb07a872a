//! The Zoomify `ImageProperties.xml` descriptor.

use std::fmt;

/// Contents of a Zoomify `ImageProperties.xml` descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomifyProperties {
    pub width: u32,
    pub height: u32,
    /// Tiles across all levels
    pub num_tiles: u64,
    pub tile_size: u32,
}

impl ZoomifyProperties {
    /// Render the descriptor, terminated by a newline.
    pub fn to_xml(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ZoomifyProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            r#"<IMAGE_PROPERTIES WIDTH="{}" HEIGHT="{}" NUMTILES="{}" NUMIMAGES="1" VERSION="1.8" TILESIZE="{}" />"#,
            self.width, self.height, self.num_tiles, self.tile_size
        )
    }
}
