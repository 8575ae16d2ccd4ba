//! User defaults loaded from a TOML file.
//!
//! Lookup order: an explicit `--config` path, the `ZIPMAN_CONFIG`
//! environment variable, `~/.zipman.toml`, then built-in defaults.
//! Missing keys fall back to their defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "ZIPMAN_CONFIG";

const CONFIG_FILE_NAME: &str = ".zipman.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Destination used by `extract` when `-d` is not given.
    pub default_extract_dir: PathBuf,
    /// DEFLATE level 0-9 used by `create` when `-l` is not given.
    pub compression_level: u32,
    /// Longest file name shown in listings before truncation.
    pub max_filename_display: usize,
    /// Interactive password prompts before giving up.
    pub password_attempts: usize,
    /// Replace existing files on extraction.
    pub overwrite: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_extract_dir: PathBuf::from("extracted_files"),
            compression_level: 6,
            max_filename_display: 50,
            password_attempts: 3,
            overwrite: false,
        }
    }
}

impl Config {
    /// Load the first config file found, or the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(|| {
                    home::home_dir()
                        .map(|home| home.join(CONFIG_FILE_NAME))
                        .filter(|p| p.is_file())
                }),
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_level > 9 {
            return Err(ConfigError::Invalid(format!(
                "compression_level must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.password_attempts == 0 {
            return Err(ConfigError::Invalid(
                "password_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_filename_display < 4 {
            return Err(ConfigError::Invalid(
                "max_filename_display must be at least 4".to_string(),
            ));
        }
        Ok(())
    }
}
