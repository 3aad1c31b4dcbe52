//! Ignore-file predicate for the source scanner.
//!
//! Loads `.gitignore` and `.ignore` from the scan root and, when the root sits
//! inside a git work tree, the `.gitignore` at the top of that tree. No ignore
//! file means nothing is filtered.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

const IGNORE_FILES: &[&str] = &[".gitignore", ".ignore"];

/// Gitignore-based path filtering
#[derive(Default)]
pub struct IgnoreFilter {
    matchers: Vec<Gitignore>,
}

impl IgnoreFilter {
    /// Filter that ignores nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Load ignore files for a scan root.
    ///
    /// `root` should be canonical so it prefixes every path the walker yields.
    pub fn load_for_root(root: &Path) -> Self {
        let mut filter = Self::new();

        if let Some(git_root) = find_git_root(root) {
            if git_root != root {
                filter.add_directory(&git_root, &[".gitignore"]);
            }
        }
        filter.add_directory(root, IGNORE_FILES);

        filter
    }

    /// Build a filter from in-memory patterns (gitignore syntax), rooted at `root`
    pub fn from_patterns(root: &Path, patterns: &[&str]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        let mut filter = Self::new();
        match builder.build() {
            Ok(gi) if !gi.is_empty() => filter.matchers.push(gi),
            Ok(_) => {}
            Err(e) => log::warn!("Failed to build ignore patterns: {}", e),
        }
        filter
    }

    fn add_directory(&mut self, dir: &Path, names: &[&str]) {
        let mut builder = GitignoreBuilder::new(dir);
        let mut any = false;

        for name in names {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            if let Some(e) = builder.add(&path) {
                log::warn!("Failed to load {}: {}", path.display(), e);
            } else {
                log::debug!("Loaded ignore file {}", path.display());
                any = true;
            }
        }

        if !any {
            return;
        }

        match builder.build() {
            Ok(gi) if !gi.is_empty() => self.matchers.push(gi),
            Ok(_) => {}
            Err(e) => log::warn!("Failed to build ignore rules for {}: {}", dir.display(), e),
        }
    }

    /// Check if a path should be ignored.
    ///
    /// Parent directories are consulted too, so `build/` ignores `build/x.py`.
    /// Paths outside a matcher's root are never matched by it.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.matchers.iter().any(|gi| {
            path.starts_with(gi.path())
                && path != gi.path()
                && gi.matched_path_or_any_parents(path, is_dir).is_ignore()
        })
    }
}

/// Nearest ancestor (inclusive) containing a `.git` entry
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}
