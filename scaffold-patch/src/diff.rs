use std::fmt;
use std::path::Path;

use similar::{ChangeTag, TextDiff};

/// Line counts for one or more changed files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffStats {
    pub fn between(original: &str, modified: &str) -> Self {
        let mut stats = DiffStats::default();
        for change in TextDiff::from_lines(original, modified).iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => stats.lines_added += 1,
                ChangeTag::Delete => stats.lines_removed += 1,
                ChangeTag::Equal => {}
            }
        }
        if stats.lines_added > 0 || stats.lines_removed > 0 {
            stats.files_changed = 1;
        }
        stats
    }

    pub fn add(&mut self, other: &DiffStats) {
        self.files_changed += other.files_changed;
        self.lines_added += other.lines_added;
        self.lines_removed += other.lines_removed;
    }

    pub fn print_summary(&self) {
        println!("\nSummary:");
        println!("{}", self);
    }
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s) changed, {} insertion(s)(+), {} deletion(s)(-)",
            self.files_changed, self.lines_added, self.lines_removed
        )
    }
}

/// Unified diff between the original and modified text of `path`, with
/// `context_lines` lines of context around each hunk.
pub fn generate_unified_diff(
    path: &Path,
    original: &str,
    modified: &str,
    context_lines: usize,
) -> (String, DiffStats) {
    let stats = DiffStats::between(original, modified);
    let label = path.display().to_string();
    let mut output = format!("--- a/{}\n+++ b/{}\n", label, label);
    if stats.files_changed > 0 {
        let diff = TextDiff::from_lines(original, modified);
        output.push_str(&diff.unified_diff().context_radius(context_lines).to_string());
    }
    (output, stats)
}

/// Print the unified diff for one file, if it changed.
pub fn print_diff(path: &Path, original: &str, modified: &str) -> DiffStats {
    let (output, stats) = generate_unified_diff(path, original, modified, 3);
    if stats.files_changed > 0 {
        print!("{}", output);
    }
    stats
}

/// Print one `path | +added -removed` line for a changed file.
pub fn print_summary_diff(path: &Path, original: &str, modified: &str) -> DiffStats {
    let stats = DiffStats::between(original, modified);
    if stats.files_changed > 0 {
        println!("{} | +{} -{}", path.display(), stats.lines_added, stats.lines_removed);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unified_diff_shows_inserted_statement() {
        let original = "var app = builder.Build();\napp.UseRouting();\napp.Run();\n";
        let modified = "var app = builder.Build();\napp.UseRouting();\napp.UseAuthentication();\napp.Run();\n";
        let path = PathBuf::from("Program.cs");

        let (diff, stats) = generate_unified_diff(&path, original, modified, 3);

        assert!(diff.starts_with("--- a/Program.cs\n+++ b/Program.cs\n"));
        assert!(diff.contains("+app.UseAuthentication();"));
        assert_eq!(
            stats,
            DiffStats {
                files_changed: 1,
                lines_added: 1,
                lines_removed: 0
            }
        );
    }

    #[test]
    fn identical_text_has_no_hunks() {
        let text = "app.Run();\n";
        let (diff, stats) = generate_unified_diff(Path::new("Program.cs"), text, text, 3);
        assert_eq!(diff, "--- a/Program.cs\n+++ b/Program.cs\n");
        assert_eq!(stats, DiffStats::default());
    }

    #[test]
    fn replaced_line_counts_both_ways() {
        let stats = DiffStats::between(
            "public IActionResult Index()\n",
            "public async Task<IActionResult> Index()\n",
        );
        assert_eq!(stats.lines_added, 1);
        assert_eq!(stats.lines_removed, 1);
    }

    #[test]
    fn stats_accumulate() {
        let mut total = DiffStats::default();
        total.add(&DiffStats { files_changed: 1, lines_added: 5, lines_removed: 2 });
        total.add(&DiffStats { files_changed: 1, lines_added: 3, lines_removed: 0 });
        assert_eq!(total.files_changed, 2);
        assert_eq!(total.lines_added, 8);
        assert_eq!(total.to_string(), "2 file(s) changed, 8 insertion(s)(+), 2 deletion(s)(-)");
    }
}
