// SPDX-License-Identifier: MIT
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::splitter::SplitMode;
use crate::writer::SizePolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Options for the command line tool and batch driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub split_mode: SplitMode,
    pub size_policy: SizePolicy,
    /// File extension scanned in batch mode, without the dot
    pub extension: String,
    /// Write `<stem>_extracted_data.txt` next to each verified preset
    pub write_extracted: bool,
    /// Stop a batch at the first failing file
    pub fail_fast: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            split_mode: SplitMode::MarkerScanned,
            size_policy: SizePolicy::Zero,
            extension: "fxp".to_string(),
            write_extracted: false,
            fail_fast: false,
        }
    }
}

impl ToolConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.extension.is_empty() {
            return Err("extension cannot be empty".to_string());
        }

        if self.extension.starts_with('.') {
            return Err("extension must be given without a leading dot".to_string());
        }

        if self.extension.contains(['/', '\\']) {
            return Err("extension cannot contain a path separator".to_string());
        }

        Ok(())
    }

    /// Whether `path` carries the configured extension (case-insensitive)
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}
