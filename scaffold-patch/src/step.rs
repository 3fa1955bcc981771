//! Runs a [`ModifierConfig`] over a project: one file at a time, each
//! failure contained to its own file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::detect::detect_shape;
use crate::diff::DiffStats;
use crate::editor::{apply_changes, EditOutcome};
use crate::error::SkippedChange;
use crate::fs::FileSystem;
use crate::model::{ChangeSet, ModifierConfig};
use crate::syntax::SourceDocument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Updated {
        applied: usize,
        original: String,
        updated: String,
        stats: DiffStats,
    },
    UpToDate,
    NotFound,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// `FileName` as written in the config.
    pub file_name: String,
    pub path: Option<PathBuf>,
    pub outcome: FileOutcome,
    pub skipped: Vec<SkippedChange>,
}

impl FileReport {
    fn new(file_name: &str, path: Option<PathBuf>, outcome: FileOutcome) -> Self {
        Self {
            file_name: file_name.to_string(),
            path,
            outcome,
            skipped: Vec::new(),
        }
    }

    fn failed(file_name: &str, path: Option<PathBuf>, error: &anyhow::Error) -> Self {
        warn!(file = %file_name, error = %format!("{:#}", error), "file failed");
        Self::new(
            file_name,
            path,
            FileOutcome::Failed {
                error: format!("{:#}", error),
            },
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub identifier: String,
    pub files: Vec<FileReport>,
}

impl StepReport {
    pub fn updated(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|file| matches!(file.outcome, FileOutcome::Updated { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.files
            .iter()
            .any(|file| matches!(file.outcome, FileOutcome::Failed { .. }))
    }

    pub fn stats(&self) -> DiffStats {
        let mut total = DiffStats::default();
        for file in &self.files {
            if let FileOutcome::Updated { stats, .. } = &file.outcome {
                total.add(stats);
            }
        }
        total
    }
}

/// True when `path` matches one of the exclusion patterns: a glob when the
/// pattern has glob characters, a substring otherwise.
pub fn is_excluded(path: &Path, patterns: &[String]) -> bool {
    let path_str = path.to_string_lossy();
    patterns.iter().any(|pattern| {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(&path_str))
                .unwrap_or(false)
        } else {
            path_str.contains(pattern.as_str())
        }
    })
}

#[derive(Debug, Clone, Default)]
pub struct CodeChangeStep {
    pub project_root: PathBuf,
    pub capabilities: BTreeMap<String, bool>,
    pub exclude: Vec<String>,
    /// When false the step only computes new text.
    pub write: bool,
}

impl CodeChangeStep {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            write: true,
            ..Self::default()
        }
    }

    pub fn with_capabilities(mut self, capabilities: BTreeMap<String, bool>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_exclusions(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn writing(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Find the file a change set targets: `<root>/<file_name>` when it
    /// exists, otherwise the one file under the root whose path ends with
    /// `file_name`.
    pub fn resolve(&self, fs: &dyn FileSystem, file_name: &str) -> Result<Option<PathBuf>> {
        let direct = self.project_root.join(file_name);
        if fs.exists(&direct) && !is_excluded(&direct, &self.exclude) {
            return Ok(Some(direct));
        }

        let wanted = Path::new(file_name);
        let matches: Vec<PathBuf> = fs
            .list_files(&self.project_root)?
            .into_iter()
            .filter(|path| path.ends_with(wanted) && !is_excluded(path, &self.exclude))
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.into_iter().next()),
            n => bail!(
                "`{}` is ambiguous: {} files match ({})",
                file_name,
                n,
                matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    pub fn run(&self, fs: &dyn FileSystem, config: &ModifierConfig) -> StepReport {
        debug!(identifier = %config.identifier, files = config.files.len(), "running code changes");
        StepReport {
            identifier: config.identifier.clone(),
            files: config
                .files
                .iter()
                .map(|changes| self.process(fs, changes))
                .collect(),
        }
    }

    fn process(&self, fs: &dyn FileSystem, changes: &ChangeSet) -> FileReport {
        let file_name = changes.file_name.as_str();
        let path = match self.resolve(fs, file_name) {
            Ok(Some(path)) => path,
            Ok(None) => {
                debug!(file = %file_name, "target file not found");
                return FileReport::new(file_name, None, FileOutcome::NotFound);
            }
            Err(e) => return FileReport::failed(file_name, None, &e),
        };

        let original = match fs.read_to_string(&path) {
            Ok(text) => text,
            Err(e) => return FileReport::failed(file_name, Some(path), &e),
        };
        let document = match SourceDocument::parse(original.as_str()) {
            Ok(document) => document,
            Err(e) => return FileReport::failed(file_name, Some(path), &anyhow::Error::from(e)),
        };
        if document.has_syntax_errors() {
            warn!(path = %path.display(), "target file has syntax errors");
        }

        let shape = detect_shape(&document, &self.capabilities);
        let EditOutcome {
            document,
            applied,
            skipped,
        } = match apply_changes(changes, &shape, &document) {
            Ok(outcome) => outcome,
            Err(e) => return FileReport::failed(file_name, Some(path), &anyhow::Error::from(e)),
        };

        let outcome = if applied == 0 {
            FileOutcome::UpToDate
        } else {
            let updated = document.into_text();
            if self.write {
                if let Err(e) = fs.write(&path, &updated) {
                    return FileReport::failed(file_name, Some(path), &e);
                }
            }
            info!(path = %path.display(), applied, skipped = skipped.len(), "updated file");
            FileOutcome::Updated {
                applied,
                stats: DiffStats::between(&original, &updated),
                original,
                updated,
            }
        };
        FileReport {
            skipped,
            ..FileReport::new(file_name, Some(path), outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFileSystem;
    use crate::model::{CodeChange, MethodEdit};

    const PROGRAM: &str = "var builder = WebApplication.CreateBuilder(args);\nvar app = builder.Build();\napp.Run();\n";

    fn config(files: Vec<ChangeSet>) -> ModifierConfig {
        ModifierConfig {
            identifier: "Test".to_string(),
            files,
        }
    }

    fn global_change(file_name: &str, block: &str) -> ChangeSet {
        let mut changes = ChangeSet {
            file_name: file_name.to_string(),
            ..ChangeSet::default()
        };
        changes.methods.insert(
            "Global".to_string(),
            MethodEdit {
                code_changes: vec![CodeChange {
                    insert_after: Some("var app = builder.Build();".to_string()),
                    ..CodeChange::new(block)
                }],
                ..MethodEdit::default()
            },
        );
        changes
    }

    #[test]
    fn resolves_direct_and_nested_paths() -> Result<()> {
        let fs = InMemoryFileSystem::new()
            .with_file("/app/Program.cs", PROGRAM)
            .with_file("/app/Controllers/HomeController.cs", "class HomeController { }\n")
            .with_file("/app/obj/HomeController.cs", "");
        let step = CodeChangeStep::new("/app");
        assert_eq!(step.resolve(&fs, "Program.cs")?, Some(PathBuf::from("/app/Program.cs")));
        assert_eq!(
            step.resolve(&fs, "HomeController.cs")?,
            Some(PathBuf::from("/app/Controllers/HomeController.cs"))
        );
        assert_eq!(step.resolve(&fs, "Startup.cs")?, None);
        Ok(())
    }

    #[test]
    fn ambiguous_and_excluded_files() -> Result<()> {
        let fs = InMemoryFileSystem::new()
            .with_file("/app/Web/Program.cs", PROGRAM)
            .with_file("/app/Tests/Program.cs", PROGRAM);
        let step = CodeChangeStep::new("/app");
        assert!(step.resolve(&fs, "Program.cs").is_err());

        let step = step.with_exclusions(vec!["*/Tests/*".to_string()]);
        assert_eq!(step.resolve(&fs, "Program.cs")?, Some(PathBuf::from("/app/Web/Program.cs")));
        Ok(())
    }

    #[test]
    fn failures_are_contained_per_file() {
        let fs = InMemoryFileSystem::new()
            .with_file("/app/Program.cs", PROGRAM)
            .with_file("/app/Other.cs", PROGRAM);
        let report = CodeChangeStep::new("/app").run(
            &fs,
            &config(vec![
                global_change("Other.cs", "app.UseRouting(;"),
                global_change("Missing.cs", "app.UseRouting();"),
                global_change("Program.cs", "app.UseRouting();"),
            ]),
        );

        assert!(matches!(report.files[0].outcome, FileOutcome::Failed { .. }));
        assert_eq!(report.files[1].outcome, FileOutcome::NotFound);
        assert!(matches!(report.files[2].outcome, FileOutcome::Updated { applied: 1, .. }));
        assert!(report.has_failures());
        assert_eq!(report.stats().lines_added, 1);

        assert_eq!(fs.get(Path::new("/app/Other.cs")).as_deref(), Some(PROGRAM));
        let written = fs.get(Path::new("/app/Program.cs")).unwrap_or_default();
        assert!(written.contains("var app = builder.Build();\napp.UseRouting();\napp.Run();"));
    }

    #[test]
    fn dry_run_leaves_files_alone_and_second_run_is_up_to_date() {
        let fs = InMemoryFileSystem::new().with_file("/app/Program.cs", PROGRAM);
        let config = config(vec![global_change("Program.cs", "app.UseRouting();")]);

        let dry = CodeChangeStep::new("/app").writing(false).run(&fs, &config);
        assert_eq!(dry.updated().count(), 1);
        assert_eq!(fs.get(Path::new("/app/Program.cs")).as_deref(), Some(PROGRAM));

        CodeChangeStep::new("/app").run(&fs, &config);
        let again = CodeChangeStep::new("/app").run(&fs, &config);
        assert_eq!(again.files[0].outcome, FileOutcome::UpToDate);
    }
}
