use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::Config;

const SAMPLE_CONFIG: &str = include_str!("../config.sample.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config files specified")]
    Empty,
    #[error("error reading {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("error parsing {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("config file already exists: {0}")]
    Exists(PathBuf),
}

/// Load and merge one or more config files.
pub fn load_all(paths: &[PathBuf]) -> Result<Config, ConfigError> {
    let mut config: Option<Config> = None;

    for path in paths {
        log::info!("loading config: {}", path.display());
        let c = read_file(path)?;
        if let Some(ref mut existing) = config {
            // Merge configs.
            merge(existing, c);
        } else {
            config = Some(c);
        }
    }

    config.ok_or(ConfigError::Empty)
}

/// Generate sample config file.
pub fn generate_sample(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::Exists(path.to_path_buf()));
    }
    std::fs::write(path, SAMPLE_CONFIG).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
}

/// Load configuration from a given TOML file.
fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    parse(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

fn parse(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Merge the given src config into the dest config struct.
fn merge(dest: &mut Config, src: Config) {
    // Merge app config.
    if !src.app.address.is_empty() {
        dest.app.address = src.app.address;
    }
    if !src.app.cors_origins.is_empty() {
        dest.app.cors_origins = src.app.cors_origins;
    }

    // Merge model config.
    if !src.model.dir.is_empty() {
        dest.model.dir = src.model.dir;
    }
    if src.model.top_k > 0 {
        dest.model.top_k = src.model.top_k;
    }
    if src.model.max_candidates > 0 {
        dest.model.max_candidates = src.model.max_candidates;
    }

    // Optional sections replace the whole section.
    if src.filter.is_some() {
        dest.filter = src.filter;
    }
    if src.cache.is_some() {
        dest.cache = src.cache;
    }
}
