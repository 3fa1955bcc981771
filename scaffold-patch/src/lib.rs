//! Declarative, idempotent patching of C# source files.
//!
//! A [`ModifierConfig`] describes structural edits per file: imports, class
//! attributes and members, method parameters and return types, and
//! statements placed relative to anchors. [`apply_changes`] applies one
//! file's edits to a parsed [`SourceDocument`]; [`CodeChangeStep`] runs a
//! whole config over a project through a [`FileSystem`].

pub mod anchor;
pub mod config;
pub mod detect;
pub mod diff;
pub mod editor;
pub mod error;
pub mod fs;
pub mod model;
pub mod options;
pub mod signature;
pub mod state;
pub mod step;
pub mod surgical;
pub mod synth;
pub mod syntax;


pub use config::load_config;
pub use detect::detect_shape;
pub use diff::{generate_unified_diff, print_diff, DiffStats};
pub use editor::{apply_changes, EditOutcome};
pub use error::{EditError, SkipReason, SkippedChange};
pub use fs::{FileSystem, InMemoryFileSystem, RealFileSystem};
pub use model::{ChangeKind, ChangeSet, CodeChange, Formatting, MethodEdit, ModifierConfig};
pub use options::ProjectShape;
pub use step::{CodeChangeStep, FileOutcome, FileReport, StepReport};
pub use syntax::SourceDocument;
