//! Configuration parsing for fermoview
//!
//! Parses the YAML file naming the dashboard payloads of one job, the results
//! directory for downloads, server settings and an optional filter preset.

use crate::panel::FilterInputs;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Job id used in download and file-check URLs
    pub job_id: String,

    /// Directory holding `<job_id>/results/` output files
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Dashboard payload files
    pub payloads: PayloadConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Initial filter panel values
    #[serde(default)]
    pub filters: FilterInputs,
}

/// Payload files; `.json` or `.json.gz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Sample name -> feature records
    pub chromatogram: PathBuf,

    /// Network kind -> cluster id -> elements
    pub network: PathBuf,

    /// Grouping category -> group values (optional)
    #[serde(default)]
    pub groups: Option<PathBuf>,

    /// Feature id -> group values (optional)
    #[serde(default)]
    pub feature_groups: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Open the dashboard in the default browser on startup
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            open_browser: default_open_browser(),
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_port() -> u16 {
    8765
}

fn default_open_browser() -> bool {
    true
}

/// Relative paths are taken relative to the directory of the config file
fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        resolve(base, &mut self.results_dir);
        resolve(base, &mut self.payloads.chromatogram);
        resolve(base, &mut self.payloads.network);
        if let Some(p) = self.payloads.groups.as_mut() {
            resolve(base, p);
        }
        if let Some(p) = self.payloads.feature_groups.as_mut() {
            resolve(base, p);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.job_id.trim().is_empty() {
            anyhow::bail!("job_id must not be empty");
        }
        if self.job_id.contains(['/', '\\']) || self.job_id.contains("..") {
            anyhow::bail!("job_id must be a single path component: {}", self.job_id);
        }

        let payloads = [
            ("chromatogram", Some(&self.payloads.chromatogram)),
            ("network", Some(&self.payloads.network)),
            ("groups", self.payloads.groups.as_ref()),
            ("feature_groups", self.payloads.feature_groups.as_ref()),
        ];
        for (name, path) in payloads {
            if let Some(path) = path {
                if !path.exists() {
                    anyhow::bail!("{} payload not found: {}", name, path.display());
                }
            }
        }

        Ok(())
    }
}

/// Load a filter preset on its own (same shape as the `filters` section)
pub fn load_filters<P: AsRef<Path>>(path: P) -> Result<FilterInputs> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filter preset: {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse filter preset: {}", path.display()))
}
