//! File access for the code-change step.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use walkdir::WalkDir;

/// Directory names never searched for target files.
pub const SKIPPED_DIRS: &[&str] = &["bin", "obj", ".git"];

pub trait FileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    /// Every file under `root`, outside [`SKIPPED_DIRS`], sorted.
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

fn in_skipped_dir(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(name) => name.to_str().is_some_and(|name| SKIPPED_DIRS.contains(&name)),
        _ => false,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        });
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Files kept in memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileSystem {
    files: Arc<RwLock<BTreeMap<PathBuf, String>>>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), contents.into());
        }
        self
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.files.read().ok()?.get(path).cloned()
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.read().map_err(|e| anyhow!(e.to_string()))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("Failed to read {}: no such file", path.display()))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let mut files = self.files.write().map_err(|e| anyhow!(e.to_string()))?;
        files.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.read().map_err(|e| anyhow!(e.to_string()))?;
        Ok(files
            .keys()
            .filter(|path| {
                path.strip_prefix(root)
                    .map(|relative| !in_skipped_dir(relative))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}
