// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotator settings.
//!
//! Settings are read from a YAML or JSON file; every field has a default so
//! a partial (or missing) file is fine.

use crate::io::serialization::Format;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Encoding used when saving image-set sidecars
    #[serde(default)]
    pub format: Format,
    /// Number of undo steps kept by a session
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Rewind steps offered by the transport controls, in seconds
    #[serde(default = "default_seek_step_seconds")]
    pub seek_step_seconds: Vec<f64>,
    /// Clip drawn regions to the video resolution
    #[serde(default = "default_true")]
    pub clamp_regions: bool,
    /// Species offered before any annotation carries a label
    #[serde(default)]
    pub default_species: Vec<String>,
}

fn default_history_size() -> usize {
    50
}

fn default_seek_step_seconds() -> Vec<f64> {
    vec![1.0, 3.0]
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: Format::default(),
            history_size: default_history_size(),
            seek_step_seconds: default_seek_step_seconds(),
            clamp_regions: true,
            default_species: Vec::new(),
        }
    }
}

impl Config {
    /// Load settings from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = match Format::from_path(path)? {
            Format::Json => serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?,
            Format::Yaml => serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?,
        };
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("none.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.history_size, 50);
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotator.yaml");
        std::fs::write(&path, "format: yaml\ndefault_species:\n  - cod\n  - haddock\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.format, Format::Yaml);
        assert_eq!(config.default_species, vec!["cod", "haddock"]);
        assert_eq!(config.seek_step_seconds, vec![1.0, 3.0]);
        assert!(config.clamp_regions);
    }

    #[test]
    fn test_bad_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotator.json");
        std::fs::write(&path, r#"{"history_size": "lots"}"#).unwrap();
        assert!(Config::load(&path).is_err());
    }
}
