//! The repository root every request is resolved under.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::path::IMAGE_PROPERTIES;
use super::resolver::StorageKind;
use crate::error::RepositoryError;

/// How deep `discover_containers` descends below the root
const MAX_DISCOVERY_DEPTH: usize = 8;

/// Extensions treated as pyramid archives when listing a repository
const ARCHIVE_EXTENSIONS: &[&str] = &["tif", "tiff", "ptif", "btf"];

/// Immutable, canonical repository root.
///
/// Established once at startup and shared read-only between workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryContext {
    root: Arc<Path>,
}

impl RepositoryContext {
    /// Canonicalize `root` and check that it is an existing directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let root = root.as_ref();
        let canonical = fs::canonicalize(root).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RepositoryError::NotFound {
                    path: root.to_path_buf(),
                }
            } else {
                RepositoryError::Io {
                    path: root.to_path_buf(),
                    source,
                }
            }
        })?;

        let metadata = fs::metadata(&canonical).map_err(|source| RepositoryError::Io {
            path: canonical.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(RepositoryError::NotADirectory { path: canonical });
        }

        Ok(Self {
            root: Arc::from(canonical),
        })
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a canonical path lies at or below the root.
    pub fn contains(&self, canonical: &Path) -> bool {
        canonical.starts_with(&self.root)
    }

    /// List the containers found under the root.
    ///
    /// Directories holding an `ImageProperties.xml` are file bundles and are
    /// not descended into. Files with a TIFF-like extension are pyramid
    /// archives. Symlinks are skipped. Results are sorted by path.
    pub fn discover_containers(&self) -> Result<Vec<ContainerEntry>, RepositoryError> {
        let mut found = Vec::new();
        self.walk(&self.root, 0, &mut found)?;
        found.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(found)
    }

    fn walk(
        &self,
        dir: &Path,
        depth: usize,
        found: &mut Vec<ContainerEntry>,
    ) -> Result<(), RepositoryError> {
        let entries = fs::read_dir(dir).map_err(|source| RepositoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| RepositoryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            let relative = match path.strip_prefix(&self.root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };

            if file_type.is_dir() {
                if path.join(IMAGE_PROPERTIES).is_file() {
                    found.push(ContainerEntry {
                        relative_path: relative,
                        kind: StorageKind::FileBundle,
                    });
                } else if depth + 1 < MAX_DISCOVERY_DEPTH {
                    self.walk(&path, depth + 1, found)?;
                } else {
                    debug!(path = %relative.display(), "Skipping directory below discovery depth");
                }
            } else if file_type.is_file() && has_archive_extension(&path) {
                found.push(ContainerEntry {
                    relative_path: relative,
                    kind: StorageKind::Pyramid,
                });
            }
        }

        Ok(())
    }
}

fn has_archive_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// A container found by [`RepositoryContext::discover_containers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Path relative to the repository root
    pub relative_path: PathBuf,
    pub kind: StorageKind,
}
