//! Position-safe text editing.
//!
//! Rewrites are planned against the original text and applied from the end
//! of the file backwards, so an edit never shifts the offsets of an edit
//! that has not been applied yet.

use std::ops::Range;

use thiserror::Error;

/// Replaces `range` of the source with `replacement`.
///
/// An empty range is a pure insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl TextEdit {
    pub fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::replace(offset..offset, text)
    }
}

/// Errors raised when an edit plan is inconsistent with the source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("edit {start}..{end} is outside a source of {len} bytes")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("edit {start}..{end} does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },

    #[error("edits {first:?} and {second:?} overlap")]
    Overlap {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("source at offset {position} no longer matches the recorded declaration")]
    StaleRecord { position: usize },
}

/// A single planned rewrite of a declaration found in a source file.
///
/// `original_text` is kept alongside `position` so the edit can be checked
/// against the exact substring it is meant to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationRecord {
    pub position: usize,
    pub replacement_text: String,
    pub original_text: String,
    pub requires_auxiliary_import: bool,
}

impl TransformationRecord {
    /// Converts the record into an edit, verifying it still matches `source`.
    pub fn to_edit(&self, source: &str) -> Result<TextEdit, EditError> {
        let end = self.position + self.original_text.len();
        match source.get(self.position..end) {
            Some(current) if current == self.original_text => {
                Ok(TextEdit::replace(self.position..end, self.replacement_text.clone()))
            }
            _ => Err(EditError::StaleRecord {
                position: self.position,
            }),
        }
    }
}

/// Applies non-overlapping edits in descending start order.
///
/// ## Examples
///
/// ```
/// use clientgen::transform::{TextEdit, apply_edits};
///
/// let source = "enum A {}\nenum B {}\n";
/// let edits = vec![
///     TextEdit::replace(0..9, "type A = never;"),
///     TextEdit::replace(10..19, "type B = never;"),
/// ];
/// assert_eq!(
///     apply_edits(source, edits).unwrap(),
///     "type A = never;\ntype B = never;\n"
/// );
/// ```
///
/// ## Errors
///
/// Returns `EditError` if any edit is out of bounds, splits a UTF-8
/// character, or overlaps another edit. The source is left untouched.
pub fn apply_edits(source: &str, mut edits: Vec<TextEdit>) -> Result<String, EditError> {
    for edit in &edits {
        let Range { start, end } = edit.range;
        if start > end || end > source.len() {
            return Err(EditError::OutOfBounds {
                start,
                end,
                len: source.len(),
            });
        }
        if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
            return Err(EditError::NotCharBoundary { start, end });
        }
    }

    edits.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then(b.range.end.cmp(&a.range.end))
    });

    for pair in edits.windows(2) {
        let (later, earlier) = (&pair[0], &pair[1]);
        if earlier.range.end > later.range.start {
            return Err(EditError::Overlap {
                first: earlier.range.clone(),
                second: later.range.clone(),
            });
        }
    }

    let mut output = source.to_string();
    for edit in &edits {
        output.replace_range(edit.range.clone(), &edit.replacement);
    }

    Ok(output)
}
