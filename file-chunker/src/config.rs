use std::path::Path;

use chunk_model::TableFormat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigurationError};

/// Default fragmentation settings.
#[derive(Debug, Clone, Copy)]
pub struct FragmentDefaults {
    pub enable_fragmentation: bool,
    pub max_chunk_size: usize,
    pub min_fragment_size: usize,
    pub chunk_overlap: usize,
    pub enable_context_rebuild: bool,
}

/// Shared defaults so the CLI, YAML loader and tests stay in sync.
pub const FRAGMENT_DEFAULTS: FragmentDefaults = FragmentDefaults {
    enable_fragmentation: true,
    max_chunk_size: 1000,
    min_fragment_size: 200,
    chunk_overlap: 100,
    enable_context_rebuild: true,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    #[serde(alias = "enable")]
    pub enable_fragmentation: bool,
    pub max_chunk_size: usize,
    pub min_fragment_size: usize,
    pub chunk_overlap: usize,
    pub enable_context_rebuild: bool,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            enable_fragmentation: FRAGMENT_DEFAULTS.enable_fragmentation,
            max_chunk_size: FRAGMENT_DEFAULTS.max_chunk_size,
            min_fragment_size: FRAGMENT_DEFAULTS.min_fragment_size,
            chunk_overlap: FRAGMENT_DEFAULTS.chunk_overlap,
            enable_context_rebuild: FRAGMENT_DEFAULTS.enable_context_rebuild,
        }
    }
}

impl FragmentConfig {
    /// Checks every rule and reports all violations at once.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut violations = Vec::new();
        if self.max_chunk_size <= self.min_fragment_size {
            violations.push(format!(
                "max_chunk_size ({}) must be greater than min_fragment_size ({})",
                self.max_chunk_size, self.min_fragment_size
            ));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            violations.push(format!(
                "chunk_overlap ({}) must be less than max_chunk_size ({})",
                self.chunk_overlap, self.max_chunk_size
            ));
        }
        if self.max_chunk_size == 0 {
            violations.push("max_chunk_size must be greater than 0".to_string());
        }
        if self.min_fragment_size == 0 {
            violations.push("min_fragment_size must be greater than 0".to_string());
        }
        if violations.is_empty() { Ok(()) } else { Err(ConfigurationError::Invalid { violations }) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableChunkingStrategy {
    #[default]
    FullOnly,
    FullAndRows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableProcessingConfig {
    pub table_format: TableFormat,
    pub table_chunking_strategy: TableChunkingStrategy,
}

/// Everything the document pipeline needs, loaded once and passed down.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fragmentation: FragmentConfig,
    pub table_processing: TableProcessingConfig,
}

impl PipelineConfig {
    /// Loads a YAML file. A missing file yields defaults; anything unreadable or invalid is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        let cfg = Self::from_yaml_str(&raw)?;
        debug!(path = %path.display(), ?cfg, "config loaded");
        Ok(cfg)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(raw);
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: PipelineConfig = serde_yaml::from_str(&expanded)?;
        cfg.fragmentation.validate()?;
        Ok(cfg)
    }
}

/// Replaces `${VAR}` with the environment value; unknown variables are kept verbatim.
pub fn expand_env_vars(input: &str) -> String {
    expand_vars_with(input, |name| std::env::var(name).ok())
}

pub fn expand_vars_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
