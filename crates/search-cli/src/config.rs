//! Configuration file loading.
//!
//! An engine configuration comes from, in order: the file given with
//! `--config`, `engine.toml` in the working directory, or the defaults.

use chess_search::EngineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "engine.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid engine configuration: {0}")]
    Invalid(#[from] chess_search::ConfigError),
}

/// Loads and validates the engine configuration.
///
/// # Errors
///
/// An explicit `path` that cannot be read is an error; a missing
/// `engine.toml` is not.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_file(path)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                parse_file(fallback)?
            } else {
                EngineConfig::default()
            }
        }
    };
    config.validate()?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse(&content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded engine configuration");
    Ok(config)
}

pub fn parse(content: &str) -> Result<EngineConfig, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_explicit_file() {
        let file = config_file("threads = 3\n\n[search]\nrfp_margin = 90\n");
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.threads, 3);
        assert_eq!(config.search.rfp_margin, 90);
        assert_eq!(config.hash_mb, 16);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        assert!(matches!(load(Some(&path)), Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let file = config_file("threads = \"many\"\n");
        assert!(matches!(load(Some(file.path())), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file = config_file("hash_mb = 0\n");
        assert!(matches!(
            load(Some(file.path())),
            Err(ConfigError::Invalid(chess_search::ConfigError::ZeroHash))
        ));
    }
}
