//! Run history: every applied run is recorded with a full backup of the
//! files it changed, so it can be listed, reverted and cleaned up.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Overrides every other state location.
pub const STATE_DIR_ENV: &str = "SCAFFOLD_PATCH_STATE_DIR";
const LOCAL_STATE_DIR: &str = ".scaffold-patch";

/// Short unique run id (7 hex characters, like a git short hash).
pub fn generate_run_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let hash = blake3::hash(&nanos.to_le_bytes());
    hash.to_hex().as_str()[..7].to_string()
}

/// State directory, by priority: `$SCAFFOLD_PATCH_STATE_DIR`, then
/// `./.scaffold-patch` with `local`, then the platform data directory.
pub fn get_state_dir(local: bool) -> Result<PathBuf> {
    if let Ok(custom_dir) = std::env::var(STATE_DIR_ENV) {
        return Ok(PathBuf::from(custom_dir));
    }
    if local {
        let current_dir = std::env::current_dir()?;
        return Ok(current_dir.join(LOCAL_STATE_DIR));
    }
    let proj_dirs = ProjectDirs::from("com", "scaffold-patch", "scaffold-patch")
        .context("Could not determine project directories")?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

pub fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

pub fn hash_file(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
    Ok(blake3::hash(&content).to_hex().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileModification {
    pub path: PathBuf,
    pub hash_before: String,
    pub hash_after: String,
    /// Backup file name inside the run's directory.
    pub backup: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Applied,
    Reverted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    /// `Identifier` of the config that was applied.
    pub config: String,
    pub files_modified: Vec<FileModification>,
    pub status: RunStatus,
    pub can_revert: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunsIndex {
    pub runs: HashMap<String, RunMetadata>,
}

/// Write through a temp file so a crash never leaves half a file behind.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("Failed to create {}", temp_path.display()))?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move {} into place", temp_path.display()))?;
    Ok(())
}

impl RunsIndex {
    pub fn load(state_dir: &Path) -> Result<Self> {
        let index_path = state_dir.join("runs.json");
        if !index_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&index_path).context("Failed to read runs index")?;
        serde_json::from_str(&content).context("Failed to parse runs index")
    }

    /// Load the index, starting over when it cannot be parsed.
    pub fn load_or_reset(state_dir: &Path) -> Result<Self> {
        match Self::load(state_dir) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(state_dir = %state_dir.display(), error = %format!("{:#}", e), "resetting unreadable runs index");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(&state_dir.join("runs.json"), &content)
    }

    pub fn add_run(&mut self, run: RunMetadata) {
        self.runs.insert(run.run_id.clone(), run);
    }

    pub fn get_run(&self, run_id: &str) -> Option<&RunMetadata> {
        self.runs.get(run_id)
    }

    /// Newest first.
    pub fn get_sorted_runs(&self) -> Vec<&RunMetadata> {
        let mut runs: Vec<_> = self.runs.values().collect();
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        runs
    }
}

/// A flat, filesystem-safe name for a backup of `file_path`. The path hash
/// keeps `a/b_c.cs` and `a_b/c.cs` apart.
fn backup_name(file_path: &Path) -> String {
    let joined = file_path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_");
    let digest = hash_text(&file_path.to_string_lossy());
    format!("{}.{}.orig", joined, &digest[..8])
}

/// Save the original text of a file about to be rewritten.
pub fn save_backup(file_path: &Path, original: &str, run_id: &str, state_dir: &Path) -> Result<String> {
    let backup_dir = state_dir.join(run_id);
    fs::create_dir_all(&backup_dir)?;
    let name = backup_name(file_path);
    fs::write(backup_dir.join(&name), original)
        .with_context(|| format!("Failed to back up {}", file_path.display()))?;
    Ok(name)
}

/// Record one file of a run: back up its original text and hash both sides.
pub fn record_modification(
    file_path: &Path,
    original: &str,
    updated: &str,
    run_id: &str,
    state_dir: &Path,
) -> Result<FileModification> {
    let backup = save_backup(file_path, original, run_id, state_dir)?;
    Ok(FileModification {
        path: file_path.to_path_buf(),
        hash_before: hash_text(original),
        hash_after: hash_text(updated),
        backup,
    })
}

pub fn save_run_metadata(run: &RunMetadata, state_dir: &Path) -> Result<()> {
    fs::create_dir_all(state_dir)?;
    let content = serde_json::to_string_pretty(run)?;
    write_atomic(&state_dir.join(format!("{}.json", run.run_id)), &content)?;

    let mut index = RunsIndex::load_or_reset(state_dir)?;
    index.add_run(run.clone());
    index.save(state_dir)
}

pub fn load_run_metadata(run_id: &str, state_dir: &Path) -> Result<RunMetadata> {
    let metadata_path = state_dir.join(format!("{}.json", run_id));
    if !metadata_path.exists() {
        bail!("Run {} not found", run_id);
    }
    let content = fs::read_to_string(&metadata_path).context("Failed to read run metadata")?;
    serde_json::from_str(&content).context("Failed to parse run metadata")
}

/// Restore every file of a run from its backups and mark the run reverted.
///
/// Refuses when a file changed after the run, unless `force`.
pub fn revert_run(run_id: &str, force: bool, state_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut run = load_run_metadata(run_id, state_dir)?;
    if run.status == RunStatus::Reverted {
        bail!("Run {} has already been reverted", run_id);
    }
    if !run.can_revert {
        bail!("Run {} cannot be reverted", run_id);
    }

    if !force {
        for file in &run.files_modified {
            if !file.path.exists() {
                bail!("File {} no longer exists (use --force to ignore)", file.path.display());
            }
            let current_hash = hash_file(&file.path)?;
            if current_hash != file.hash_after {
                bail!(
                    "File {} has changed since run {} (use --force to ignore)\nExpected hash: {}\nCurrent hash: {}",
                    file.path.display(),
                    run_id,
                    file.hash_after,
                    current_hash
                );
            }
        }
    }

    let backup_dir = state_dir.join(run_id);
    let mut restored = Vec::new();
    for file in &run.files_modified {
        let original = fs::read_to_string(backup_dir.join(&file.backup))
            .with_context(|| format!("Backup for {} is missing", file.path.display()))?;
        fs::write(&file.path, original)
            .with_context(|| format!("Failed to restore {}", file.path.display()))?;
        restored.push(file.path.clone());
    }

    run.status = RunStatus::Reverted;
    run.can_revert = false;
    save_run_metadata(&run, state_dir)?;
    Ok(restored)
}

/// One line per run, newest first.
pub fn history_lines(limit: usize, state_dir: &Path) -> Result<Vec<String>> {
    let index = RunsIndex::load_or_reset(state_dir)?;
    Ok(index
        .get_sorted_runs()
        .into_iter()
        .take(limit)
        .map(|run| {
            let status = match run.status {
                RunStatus::Applied if run.can_revert => "[can revert]",
                RunStatus::Applied => "[applied]",
                RunStatus::Reverted => "[reverted]",
            };
            let files = match run.files_modified.len() {
                1 => "1 file".to_string(),
                n => format!("{} files", n),
            };
            format!(
                "{}  {}  {:20}  {:10}  {}",
                run.run_id,
                run.timestamp.format("%Y-%m-%d %H:%M"),
                truncate_str(&run.config, 20),
                files,
                status
            )
        })
        .collect())
}

/// Drop runs older than `keep_days` with their backups. Returns how many
/// runs were removed.
pub fn clean_old_state(keep_days: u32, state_dir: &Path) -> Result<usize> {
    let index = RunsIndex::load_or_reset(state_dir)?;
    let cutoff = Utc::now() - Duration::days(i64::from(keep_days));

    let mut cleaned = 0;
    let mut kept = RunsIndex::default();
    for run in index.runs.into_values() {
        if run.timestamp >= cutoff {
            kept.add_run(run);
            continue;
        }
        let backup_dir = state_dir.join(&run.run_id);
        if backup_dir.exists() {
            fs::remove_dir_all(&backup_dir)?;
        }
        let metadata_path = state_dir.join(format!("{}.json", run.run_id));
        if metadata_path.exists() {
            fs::remove_file(&metadata_path)?;
        }
        cleaned += 1;
    }
    kept.save(state_dir)?;
    Ok(cleaned)
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
