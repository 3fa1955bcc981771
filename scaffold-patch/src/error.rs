use std::fmt;

use thiserror::Error;

/// Hard failures for a single file.
///
/// Anything that is merely "nothing to do here" (missing anchor, missing
/// method, already applied) is not an error; see [`SkipReason`].
#[derive(Debug, Error)]
pub enum EditError {
    /// Insertion text that does not parse as the node kind its insertion
    /// point needs.
    #[error("invalid {kind} snippet: `{text}`")]
    InvalidSnippet { kind: &'static str, text: String },

    /// A method edit borrows code changes from a key that is not defined.
    #[error("method edit `{method}` takes code changes from `{reference}`, which is not defined")]
    UnknownMethodEdit { method: String, reference: String },

    /// A change kind that modifies an existing node was given no node to modify.
    #[error("{location}: change type {kind} requires a `Parent` anchor")]
    MissingParent { location: String, kind: String },

    #[error("method edit keys must not be empty")]
    EmptyMethodName,

    #[error("overlapping edits at bytes {first_end} and {second_start}")]
    OverlappingEdits { first_end: usize, second_start: usize },

    #[error("edit range {start}..{end} is outside the source ({len} bytes)")]
    EditOutOfBounds { start: usize, end: usize, len: usize },

    #[error("tree-sitter failed to produce a tree for the source")]
    Parse,

    #[error("failed to load the C# grammar: {0}")]
    Language(String),
}

impl EditError {
    /// True for errors caused by a malformed change set rather than by the
    /// engine or the grammar.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EditError::InvalidSnippet { .. }
                | EditError::UnknownMethodEdit { .. }
                | EditError::MissingParent { .. }
                | EditError::EmptyMethodName
        )
    }
}

/// Why one instruction was skipped. Skips are collected, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    OptionsNotSatisfied { options: Vec<String> },
    AnchorNotFound { anchor: String, closest: Option<String> },
    MethodNotFound { method: String },
    SignatureNotMatched { method: String, required: Vec<String> },
    ClassNotFound,
    Unsupported { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OptionsNotSatisfied { options } => {
                write!(f, "options not satisfied: [{}]", options.join(", "))
            }
            SkipReason::AnchorNotFound { anchor, closest } => {
                write!(f, "anchor `{}` not found", anchor)?;
                if let Some(closest) = closest {
                    write!(f, " (closest statement: `{}`)", closest)?;
                }
                Ok(())
            }
            SkipReason::MethodNotFound { method } => write!(f, "method `{}` not found", method),
            SkipReason::SignatureNotMatched { method, required } => write!(
                f,
                "no overload of `{}` takes parameters of type [{}]",
                method,
                required.join(", ")
            ),
            SkipReason::ClassNotFound => write!(f, "file declares no class"),
            SkipReason::Unsupported { detail } => write!(f, "{}", detail),
        }
    }
}

/// One skipped instruction, with where it came from in the change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChange {
    /// Path into the change set, e.g. `Methods.Main.CodeChanges[2]`.
    pub location: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.reason)
    }
}
