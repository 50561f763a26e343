//! Configuration management for Yotrace
//!
//! Loads settings from TOML file at ~/.yotrace/config.toml

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory holding the database (defaults to ~/.yotrace)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Artifact extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".yotrace"))
        .unwrap_or_else(|| PathBuf::from(".yotrace"))
}

/// Artifact extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Characters kept in the always-present output summary
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,

    /// Outputs up to this many bytes are retained in full; larger ones only when they failed
    #[serde(default = "default_full_output_threshold")]
    pub full_output_threshold: usize,

    /// Characters of preceding message text stored as artifact context
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,

    /// Whether to scan assistant text for embedded JSON objects
    #[serde(default = "default_true")]
    pub scan_json_objects: bool,
}

fn default_summary_chars() -> usize {
    500
}

fn default_full_output_threshold() -> usize {
    10 * 1024
}

fn default_context_chars() -> usize {
    200
}

fn default_true() -> bool {
    true
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            summary_chars: default_summary_chars(),
            full_output_threshold: default_full_output_threshold(),
            context_chars: default_context_chars(),
            scan_json_objects: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());

        if !expanded_path.exists() {
            return Err(CoreError::Config(format!(
                "Configuration file not found: {}",
                expanded_path.display()
            )));
        }

        let content = std::fs::read_to_string(&expanded_path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config)
    }

    /// Load configuration from file or use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|p| p.join(".yotrace").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".yotrace/config.toml"))
    }

    /// Get the data directory, expanding ~ if present
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }

    /// Path of the SQLite database file
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("yotrace.db")
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("YOTRACE_DATA_DIR") {
            if !data_dir.is_empty() {
                self.data_dir = PathBuf::from(data_dir);
            }
        }
    }

    /// Create a default configuration file at the given path
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = r#"# Yotrace Configuration

# Where the database lives
data_dir = "~/.yotrace"

[extraction]
# Characters kept in every tool output summary
summary_chars = 500

# Tool outputs up to this many bytes are kept in full.
# Larger outputs keep only the summary unless the tool call failed.
full_output_threshold = 10240

# Characters of the preceding message stored as artifact context
context_chars = 200

# Scan assistant messages for embedded JSON objects
scan_json_objects = true
"#;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Expand ~ to home directory in paths
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.extraction.summary_chars, 500);
        assert_eq!(config.extraction.full_output_threshold, 10240);
        assert_eq!(config.extraction.context_chars, 200);
        assert!(config.extraction.scan_json_objects);
        assert!(config.db_path().ends_with("yotrace.db"));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
data_dir = "/var/lib/yotrace"

[extraction]
full_output_threshold = 2048
scan_json_objects = false
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/yotrace"));
        assert_eq!(config.extraction.full_output_threshold, 2048);
        assert_eq!(config.extraction.summary_chars, 500);
        assert!(!config.extraction.scan_json_objects);
    }

    #[test]
    fn test_default_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::create_default(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.extraction, ExtractionConfig::default());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/nonexistent/yotrace.toml").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
