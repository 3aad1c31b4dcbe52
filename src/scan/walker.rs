use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::ignore_filter::IgnoreFilter;
use crate::error::{DocstringerError, Result};

/// Extension of the files the scanner yields
pub const SOURCE_EXTENSION: &str = "py";

/// A discovered source file
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub file_size: u64,
}

/// Walks a directory tree and yields Python source files.
///
/// The walk is lazy and can be restarted: every call to [`SourceScanner::files`]
/// starts a fresh traversal. Hidden directories and anything matched by the
/// ignore predicate are pruned. Symbolic links are never followed, so
/// nothing outside the root is yielded. Unreadable entries are logged and
/// skipped.
pub struct SourceScanner {
    root: PathBuf,
    filter: IgnoreFilter,
    max_file_size: u64,
}

impl SourceScanner {
    /// Create a scanner for `root`, loading its ignore files.
    ///
    /// Fails with a configuration error if the root is missing, not a
    /// directory, or unreadable.
    pub fn new(root: &Path, max_file_size: u64) -> Result<Self> {
        let root = Self::check_root(root)?;
        let filter = IgnoreFilter::load_for_root(&root);
        Ok(Self { root, filter, max_file_size })
    }

    /// Create a scanner with an externally built ignore predicate
    pub fn with_filter(root: &Path, filter: IgnoreFilter, max_file_size: u64) -> Result<Self> {
        let root = Self::check_root(root)?;
        Ok(Self { root, filter, max_file_size })
    }

    fn check_root(root: &Path) -> Result<PathBuf> {
        let canonical = root.canonicalize().map_err(|e| {
            DocstringerError::Config(format!(
                "Root directory {} is not accessible: {}",
                root.display(),
                e
            ))
        })?;

        if !canonical.is_dir() {
            return Err(DocstringerError::Config(format!(
                "Root path must be a directory, not a file: {}",
                root.display()
            )));
        }

        std::fs::read_dir(&canonical).map_err(|e| {
            DocstringerError::Config(format!(
                "Root directory {} is not readable: {}",
                root.display(),
                e
            ))
        })?;

        Ok(canonical)
    }

    /// Canonical scan root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree, yielding candidate source files
    pub fn files(&self) -> impl Iterator<Item = SourceEntry> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.prune(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    // Permission errors only cost the entry
                    log::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter_map(move |entry| self.to_source_entry(entry))
    }

    /// Directories and files the walk should not descend into or yield
    fn prune(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }

        // Links may lead outside the root; only files under it are rewritten
        if entry.path_is_symlink() {
            log::warn!("Skipping symlink: {}", entry.path().display());
            return true;
        }

        let is_dir = entry.file_type().is_dir();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden && is_dir {
            return true;
        }

        if self.filter.is_ignored(entry.path(), is_dir) {
            log::debug!("Ignoring: {}", entry.path().display());
            return true;
        }

        false
    }

    fn to_source_entry(&self, entry: DirEntry) -> Option<SourceEntry> {
        if !entry.file_type().is_file() {
            return None;
        }

        let path = entry.path();
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        if !extension.eq_ignore_ascii_case(SOURCE_EXTENSION) {
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };

        if metadata.len() > self.max_file_size {
            log::warn!(
                "Skipping oversized file: {} ({} bytes)",
                path.display(),
                metadata.len()
            );
            return None;
        }

        let relative_path = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        Some(SourceEntry {
            relative_path,
            absolute_path: path.to_path_buf(),
            file_size: metadata.len(),
        })
    }
}
