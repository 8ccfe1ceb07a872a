//! Zoomify addressing: the path grammar, the repository root, path
//! resolution and the `ImageProperties.xml` descriptor.

mod path;
mod properties;
mod repository;
mod resolver;

pub use path::{parse_zoomify_path, PartKind, TileCoord, ZoomifyPath, IMAGE_PROPERTIES};
pub use properties::ZoomifyProperties;
pub use repository::{ContainerEntry, RepositoryContext};
pub use resolver::{normalize_lexically, resolve, CacheKey, ResolvedLocation, StorageKind};
