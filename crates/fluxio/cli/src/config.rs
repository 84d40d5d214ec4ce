//! CLI configuration
//!
//! ```toml
//! output = "json"
//!
//! [compiler]
//! task_resource_template = "arn:aws:states:::lambda:invoke:{name}"
//! include_comments = false
//! ```

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use fluxio_compiler::CompilerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Default output format when `--output` is not given
    pub output: Option<OutputFormat>,

    /// Settings passed to the compiler
    pub compiler: CompilerConfig,
}

impl CliConfig {
    /// Load configuration from file
    ///
    /// Without an explicit path the user config directory is used; a
    /// missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Ok(p) => p,
                Err(_) => return Ok(Self::default()),
            },
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: CliConfig = toml::from_str(&contents)?;
            tracing::debug!(path = %config_path.display(), "Loaded configuration");
            Ok(config)
        } else {
            Ok(CliConfig::default())
        }
    }

    /// Get the default configuration file path
    fn default_config_path() -> CliResult<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("fluxio").join("config.toml"))
    }
}
