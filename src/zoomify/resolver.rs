//! Turning an untrusted request path into a [`ResolvedLocation`].
//!
//! Resolution runs in three stages:
//!
//! 1. The grammar splits the path into container prefix and part. No match
//!    is `InvalidPathFormat`.
//! 2. The path is normalized lexically (`.` dropped, `..` folded). Any `..`
//!    that would climb above the root is a `SecurityViolation`, raised
//!    before the filesystem is touched.
//! 3. The container is canonicalized (following symlinks) and stat'ed. A
//!    directory is a file bundle, a regular file is a pyramid archive. Both
//!    the container and the target must still lie under the root after
//!    canonicalization.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};

use super::path::{parse_zoomify_path, PartKind, TileCoord};
use super::repository::RepositoryContext;
use crate::error::ZoomifyError;

/// How a container stores its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Directory of pre-cut tiles plus `ImageProperties.xml`
    FileBundle,
    /// Single tiled pyramid archive
    Pyramid,
}

/// Server-side cache key: canonical container plus part id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub container_path: PathBuf,
    pub part_id: String,
}

impl CacheKey {
    pub fn new(container_path: impl Into<PathBuf>, part_id: impl Into<String>) -> Self {
        Self {
            container_path: container_path.into(),
            part_id: part_id.into(),
        }
    }
}

/// A validated, typed location created for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub storage_kind: StorageKind,
    pub part_kind: PartKind,
    pub part_id: String,
    /// Present for tile parts
    pub tile: Option<TileCoord>,
    /// Canonical container (bundle directory or archive file)
    pub container_path: PathBuf,
    /// Canonical file whose bytes or metadata back the part
    pub target_path: PathBuf,
    pub size_bytes: u64,
    pub last_modified_millis: u64,
    /// The raw path as received
    pub request_path: String,
}

impl ResolvedLocation {
    /// Pyramid tiles are keyed by their canonical coordinate, so spellings
    /// such as `0-0-0.JPG` and `00-0-0.jpg` share one entry. Bundle parts
    /// keep the requested name, which is the file that was read.
    pub fn cache_key(&self) -> CacheKey {
        let part = match (self.storage_kind, self.tile) {
            (StorageKind::Pyramid, Some(coord)) => coord.to_string(),
            _ => self.part_id.clone(),
        };
        CacheKey::new(self.container_path.clone(), part)
    }

    pub fn content_type(&self) -> &'static str {
        self.part_kind.content_type()
    }
}

/// Resolve `raw_path` under the repository root.
pub fn resolve(repo: &RepositoryContext, raw_path: &str) -> Result<ResolvedLocation, ZoomifyError> {
    let parsed = parse_zoomify_path(raw_path).ok_or_else(|| ZoomifyError::InvalidPathFormat {
        path: raw_path.to_string(),
    })?;
    if raw_path.contains('\0') {
        return Err(ZoomifyError::InvalidPathFormat {
            path: raw_path.to_string(),
        });
    }

    let escape = || ZoomifyError::SecurityViolation {
        path: raw_path.to_string(),
    };
    let not_found = || ZoomifyError::PartNotFound {
        path: raw_path.to_string(),
    };

    // The container is a prefix of the full path, so checking the full path
    // also covers every step through the container.
    if normalize_lexically(raw_path).is_none() {
        warn!(path = %raw_path, "Rejected path escaping the repository root");
        return Err(escape());
    }
    let relative_container = normalize_lexically(&parsed.container).ok_or_else(escape)?;

    let container_path = canonicalize_inside(repo, &repo.root().join(&relative_container))
        .map_err(|failure| failure.into_error(raw_path))?;

    let container_meta = fs::metadata(&container_path).map_err(|e| {
        debug!(path = %raw_path, error = %e, "Container vanished during resolution");
        not_found()
    })?;

    let (storage_kind, target_path, target_meta) = if container_meta.is_dir() {
        // The raw path, not its lexical form: `..` after a symlink climbs
        // from the link target.
        let raw_target = repo.root().join(raw_path.trim_start_matches('/'));
        let target_path = canonicalize_inside(repo, &raw_target)
            .map_err(|failure| failure.into_error(raw_path))?;
        let target_meta = fs::metadata(&target_path).map_err(|_| not_found())?;
        if !target_meta.is_file() {
            return Err(not_found());
        }
        (StorageKind::FileBundle, target_path, target_meta)
    } else if container_meta.is_file() {
        (StorageKind::Pyramid, container_path.clone(), container_meta)
    } else {
        return Err(not_found());
    };

    let last_modified_millis = target_meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    Ok(ResolvedLocation {
        storage_kind,
        part_kind: parsed.part_kind,
        part_id: parsed.part_id,
        tile: parsed.tile,
        container_path,
        target_path,
        size_bytes: target_meta.len(),
        last_modified_millis,
        request_path: raw_path.to_string(),
    })
}

/// Normalize a request path into a root-relative path.
///
/// Leading separators are dropped, `.` is skipped and `..` pops the previous
/// segment. Returns `None` if a `..` would climb above the root.
pub fn normalize_lexically(raw: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(raw).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Prefix(_) => return None,
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                normalized.pop();
                depth -= 1;
            }
            Component::Normal(segment) => {
                normalized.push(segment);
                depth += 1;
            }
        }
    }

    Some(normalized)
}

enum CanonicalFailure {
    Missing,
    Outside,
}

impl CanonicalFailure {
    fn into_error(self, raw_path: &str) -> ZoomifyError {
        match self {
            CanonicalFailure::Missing => ZoomifyError::PartNotFound {
                path: raw_path.to_string(),
            },
            CanonicalFailure::Outside => {
                warn!(path = %raw_path, "Rejected path resolving outside the repository root");
                ZoomifyError::SecurityViolation {
                    path: raw_path.to_string(),
                }
            }
        }
    }
}

/// Canonicalize `candidate` and require the result to stay under the root.
fn canonicalize_inside(repo: &RepositoryContext, candidate: &Path) -> Result<PathBuf, CanonicalFailure> {
    let canonical = fs::canonicalize(candidate).map_err(|e| {
        if e.kind() != io::ErrorKind::NotFound {
            debug!(path = %candidate.display(), error = %e, "Canonicalization failed");
        }
        CanonicalFailure::Missing
    })?;

    if !repo.contains(&canonical) {
        return Err(CanonicalFailure::Outside);
    }
    Ok(canonical)
}
