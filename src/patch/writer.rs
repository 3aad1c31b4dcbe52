use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{DocstringerError, Result};

/// Compute SHA256 hash of file contents
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let hash = hasher.finalize();
    format!("{:x}", hash)
}

/// A source file read once for one processing pass
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    hash: String,
}

impl SourceFile {
    /// Read the file and remember its hash
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let hash = content_hash(&bytes);
        let text = String::from_utf8(bytes).map_err(|e| {
            DocstringerError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            text,
            hash,
        })
    }

    /// Replace the file's content in one step.
    ///
    /// The new content goes to a temporary file in the same directory, which
    /// is then renamed over the original, so readers see either the old or the
    /// new file. If the file changed on disk since it was read the write is
    /// refused, as the edit offsets no longer describe it.
    pub fn write_back(&self, new_text: &str) -> Result<()> {
        let current = std::fs::read(&self.path)?;
        if content_hash(&current) != self.hash {
            return Err(DocstringerError::PatchConsistency(format!(
                "{} changed on disk while it was being processed",
                self.path.display()
            )));
        }

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let permissions = std::fs::metadata(&self.path)?.permissions();
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(new_text.as_bytes())?;
        temp.as_file().set_permissions(permissions)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| DocstringerError::Io(e.error))?;

        Ok(())
    }
}
