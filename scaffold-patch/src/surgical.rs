//! Surgical edits: minimal, targeted changes to source text.
//!
//! Every change the engine makes is expressed as byte-range replacements on
//! the current text. Bytes outside those ranges are copied through untouched,
//! so comments, blank lines and hand formatting survive any number of runs.

use std::cmp::Ordering;
use std::ops::Range;

use crate::error::EditError;

/// A single textual replacement. `start == end` is a pure insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Byte offset where the replaced range starts.
    pub start: usize,
    /// Byte offset where the replaced range ends (exclusive).
    pub end: usize,
    /// The text to put in its place.
    pub new_text: String,
}

impl TextEdit {
    pub fn new(range: Range<usize>, new_text: impl Into<String>) -> Self {
        Self {
            start: range.start,
            end: range.end,
            new_text: new_text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::new(at..at, text)
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self::new(range, String::new())
    }
}

impl Ord for TextEdit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then(self.end.cmp(&other.end))
    }
}

impl PartialOrd for TextEdit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Apply edits to `source`, preserving everything they do not cover.
///
/// Edits are sorted by position; insertions at the same offset keep the
/// order they were given in. Overlapping ranges are rejected.
///
/// # Example
/// ```
/// use scaffold_patch::surgical::{apply_text_edits, TextEdit};
///
/// let source = "var x = 1;\nvar y = 2;\n";
/// let edits = vec![TextEdit::new(8..9, "42")];
///
/// let result = apply_text_edits(source, edits).unwrap();
/// assert_eq!(result, "var x = 42;\nvar y = 2;\n");
/// ```
pub fn apply_text_edits(source: &str, mut edits: Vec<TextEdit>) -> Result<String, EditError> {
    if edits.is_empty() {
        return Ok(source.to_string());
    }

    // Stable sort: same-offset insertions stay in caller order.
    edits.sort();

    for edit in &edits {
        if edit.start > edit.end
            || edit.end > source.len()
            || !source.is_char_boundary(edit.start)
            || !source.is_char_boundary(edit.end)
        {
            return Err(EditError::EditOutOfBounds {
                start: edit.start,
                end: edit.end,
                len: source.len(),
            });
        }
    }

    for pair in edits.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(EditError::OverlappingEdits {
                first_end: pair[0].end,
                second_start: pair[1].start,
            });
        }
    }

    let added: usize = edits.iter().map(|e| e.new_text.len()).sum();
    let mut result = String::with_capacity(source.len() + added);
    let mut cursor = 0;

    for edit in &edits {
        result.push_str(&source[cursor..edit.start]);
        result.push_str(&edit.new_text);
        cursor = edit.end;
    }
    result.push_str(&source[cursor..]);

    Ok(result)
}
