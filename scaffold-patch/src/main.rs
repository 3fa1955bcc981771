use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use scaffold_patch::diff::{print_diff, print_summary_diff};
use scaffold_patch::state::{
    clean_old_state, generate_run_id, get_state_dir, history_lines, record_modification,
    revert_run, save_run_metadata, RunMetadata, RunStatus,
};
use scaffold_patch::syntax::{self, SourceDocument};
use scaffold_patch::{detect_shape, load_config, CodeChangeStep, FileOutcome, RealFileSystem, StepReport};

#[derive(Parser)]
#[command(name = "scaffold-patch")]
#[command(about = "Apply declarative, idempotent source edits to C# projects")]
#[command(long_about = "Applies a modifier config (JSON or YAML) to the C# files of a project.

Every edit is anchored on existing code, checked against what is already
there, and spliced into the original text so untouched bytes never change.
Running the same config twice changes nothing the second time.

EXAMPLES:
  Preview what a config would change:
    scaffold-patch apply --config identity.json --project src/WebApp --format diff

  Apply it, declaring a capability the config gates on:
    scaffold-patch apply --config identity.json --project src/WebApp --option MicrosoftGraph --apply

  Undo the last run:
    scaffold-patch history
    scaffold-patch revert <RUN_ID>")]
#[command(version)]
struct Cli {
    /// Use project-local state directory (.scaffold-patch) instead of the user data directory
    #[arg(long, global = true)]
    local_state: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a modifier config to a project (dry run unless --apply)
    Apply {
        /// Modifier config file (.json, .yaml or .yml)
        #[arg(long)]
        config: PathBuf,

        /// Project root that FileName entries are resolved against
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Capability flag as NAME or NAME=false (can be used multiple times)
        #[arg(long = "option", value_name = "NAME[=BOOL]")]
        options: Vec<String>,

        /// Exclude paths matching these patterns (can be used multiple times)
        #[arg(long, num_args = 0..)]
        exclude: Vec<String>,

        /// Write changes to disk (without this flag, runs in dry-run mode)
        #[arg(long)]
        apply: bool,

        /// Output format: "default", "diff", or "summary"
        #[arg(long, default_value = "default")]
        format: String,

        /// Show summary statistics after the output
        #[arg(long)]
        summary: bool,
    },

    /// Show the project shape options are evaluated against for one file
    Inspect {
        /// C# source file
        file: PathBuf,

        /// Capability flag as NAME or NAME=false (can be used multiple times)
        #[arg(long = "option", value_name = "NAME[=BOOL]")]
        options: Vec<String>,
    },

    /// Show recent runs
    History {
        /// Number of recent runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Revert a specific run
    Revert {
        /// Run ID to revert (from history)
        run_id: String,

        /// Force revert even if files changed since
        #[arg(long)]
        force: bool,
    },

    /// Clean old state data
    Clean {
        /// Keep runs from last N days
        #[arg(long, default_value = "30")]
        keep_days: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply { config, project, options, exclude, apply, format, summary } => {
            let capabilities = parse_capabilities(&options)?;
            let config = load_config(&config)?;
            let step = CodeChangeStep::new(project)
                .with_capabilities(capabilities)
                .with_exclusions(exclude)
                .writing(apply);
            let report = step.run(&RealFileSystem, &config);

            print_report(&report, &format, apply);
            if summary {
                report.stats().print_summary();
            }

            if apply {
                record_run(&report, cli.local_state)?;
            } else if report.updated().next().is_some() {
                println!("\nDry run: no files written (use --apply to write changes)");
            }

            let failed = report
                .files
                .iter()
                .filter(|file| matches!(file.outcome, FileOutcome::Failed { .. }))
                .count();
            if failed > 0 {
                bail!("{} file(s) could not be updated", failed);
            }
        }

        Commands::Inspect { file, options } => {
            let capabilities = parse_capabilities(&options)?;
            inspect_file(&file, &capabilities)?;
        }

        Commands::History { limit } => {
            let state_dir = get_state_dir(cli.local_state)?;
            let lines = history_lines(limit, &state_dir)?;
            if lines.is_empty() {
                println!("No runs found");
            } else {
                println!("Recent runs (showing up to {}):\n", limit);
                for line in lines {
                    println!("{}", line);
                }
            }
        }

        Commands::Revert { run_id, force } => {
            let state_dir = get_state_dir(cli.local_state)?;
            let restored = revert_run(&run_id, force, &state_dir)?;
            for path in &restored {
                println!("  ✓ Restored: {}", path.display());
            }
            println!("✓ Run {} reverted successfully", run_id);
        }

        Commands::Clean { keep_days } => {
            let state_dir = get_state_dir(cli.local_state)?;
            let cleaned = clean_old_state(keep_days, &state_dir)?;
            println!("✓ Cleaned {} old run(s)", cleaned);
        }
    }

    Ok(())
}

/// `NAME` is true; `NAME=true` / `NAME=false` set the value explicitly.
fn parse_capabilities(options: &[String]) -> Result<BTreeMap<String, bool>> {
    let mut capabilities = BTreeMap::new();
    for option in options {
        let (name, value) = match option.split_once('=') {
            Some((name, value)) => {
                let value: bool = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid value for option `{}`: expected true or false", name))?;
                (name.trim(), value)
            }
            None => (option.trim(), true),
        };
        if name.is_empty() {
            bail!("Empty option name in `{}`", option);
        }
        capabilities.insert(name.to_string(), value);
    }
    Ok(capabilities)
}

fn print_report(report: &StepReport, format: &str, apply: bool) {
    for file in &report.files {
        let display = file
            .path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| file.file_name.clone());

        match &file.outcome {
            FileOutcome::Updated { applied, original, updated, .. } => {
                let path = Path::new(&display);
                match format {
                    "diff" => {
                        print_diff(path, original, updated);
                    }
                    "summary" => {
                        print_summary_diff(path, original, updated);
                    }
                    _ => {
                        let verb = if apply { "Modified" } else { "Would modify" };
                        println!("✓ {}: {} ({} change(s))", verb, display, applied);
                    }
                }
            }
            FileOutcome::UpToDate => println!("= Up to date: {}", display),
            FileOutcome::NotFound => println!("? Not found: {}", display),
            FileOutcome::Failed { error } => eprintln!("✗ Failed: {}: {}", display, error),
        }

        for skip in &file.skipped {
            println!("  - skipped {}", skip);
        }
    }
}

fn record_run(report: &StepReport, local_state: bool) -> Result<()> {
    let updated: Vec<_> = report.updated().collect();
    if updated.is_empty() {
        println!("No changes made");
        return Ok(());
    }

    let run_id = generate_run_id();
    let state_dir = get_state_dir(local_state)?;
    let mut files_modified = Vec::new();
    for file in updated {
        if let (Some(path), FileOutcome::Updated { original, updated, .. }) = (&file.path, &file.outcome) {
            files_modified.push(record_modification(path, original, updated, &run_id, &state_dir)?);
        }
    }

    let metadata = RunMetadata {
        run_id: run_id.clone(),
        timestamp: chrono::Utc::now(),
        command: std::env::args().collect::<Vec<_>>().join(" "),
        config: report.identifier.clone(),
        files_modified,
        status: RunStatus::Applied,
        can_revert: true,
    };
    save_run_metadata(&metadata, &state_dir)?;

    println!("\n📝 Run ID: {} (use 'scaffold-patch revert {}' to undo)", run_id, run_id);
    Ok(())
}

fn inspect_file(path: &Path, capabilities: &BTreeMap<String, bool>) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document = SourceDocument::parse(text)?;
    if document.has_syntax_errors() {
        eprintln!("⚠️  {} has syntax errors; anchors inside them may not resolve", path.display());
    }

    let shape = detect_shape(&document, capabilities);
    println!("{}", serde_json::to_string_pretty(&shape)?);

    let methods: Vec<&str> = syntax::callables(document.root())
        .into_iter()
        .filter_map(|node| syntax::declared_name(&document, node))
        .collect();
    if !methods.is_empty() {
        println!("\nMethods: {}", methods.join(", "));
    }
    Ok(())
}
