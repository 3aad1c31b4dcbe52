//! Splice generated docstrings into the original file text.
//!
//! Edits are insertions at byte offsets of the original text. They are
//! applied from the highest offset to the lowest, so each insertion only
//! moves bytes that no pending edit refers to.

pub mod writer;

use crate::error::{DocstringerError, Result};

pub use writer::{content_hash, SourceFile};

/// Insertion of `text` at `offset` in the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub offset: usize,
    pub text: String,
}

impl Edit {
    pub fn new(offset: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }
}

/// Order edits tail-to-head (descending offset)
pub fn sort_tail_to_head(edits: &mut [Edit]) {
    edits.sort_by(|a, b| b.offset.cmp(&a.offset));
}

/// Apply edits to `original`, returning the new text.
///
/// `edits` must be sorted by strictly descending offset, and every offset
/// must sit at the start of a line of `original`. Anything else is a
/// consistency error and nothing is produced. Bytes outside the inserted
/// spans are copied unchanged.
pub fn apply_edits(original: &str, edits: &[Edit]) -> Result<String> {
    let mut patched = String::with_capacity(
        original.len() + edits.iter().map(|e| e.text.len()).sum::<usize>(),
    );
    patched.push_str(original);

    let mut previous: Option<usize> = None;

    for edit in edits {
        if let Some(prev) = previous {
            if edit.offset >= prev {
                return Err(DocstringerError::PatchConsistency(format!(
                    "edit at offset {} is not below the previous edit at {}",
                    edit.offset, prev
                )));
            }
        }

        check_offset(original, edit.offset)?;

        // Everything before this offset is still the original text
        debug_assert_eq!(&patched[..edit.offset], &original[..edit.offset]);
        patched.insert_str(edit.offset, &edit.text);
        previous = Some(edit.offset);
    }

    Ok(patched)
}

fn check_offset(original: &str, offset: usize) -> Result<()> {
    if offset > original.len() || !original.is_char_boundary(offset) {
        return Err(DocstringerError::PatchConsistency(format!(
            "offset {} is outside the file ({} bytes)",
            offset,
            original.len()
        )));
    }

    if offset > 0 && original.as_bytes()[offset - 1] != b'\n' {
        return Err(DocstringerError::PatchConsistency(format!(
            "offset {} is not at the start of a line",
            offset
        )));
    }

    Ok(())
}
