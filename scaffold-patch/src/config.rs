use std::path::Path;

use anyhow::{Context, Result};

use crate::model::ModifierConfig;

impl ModifierConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse modifier config JSON")
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse modifier config YAML")
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Load a config, choosing the format by extension. Anything that is not
/// `.yaml`/`.yml` is read as JSON first, then YAML.
pub fn load_config(path: &Path) -> Result<ModifierConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;

    if is_yaml(path) {
        return ModifierConfig::from_yaml_str(&content);
    }
    serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .with_context(|| {
            format!(
                "Failed to parse config {} (tried both JSON and YAML)",
                path.display()
            )
        })
}
