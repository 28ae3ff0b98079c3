use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

pub const CONFIG_FILE: &str = "timeblock.toml";

/// Error type for reading and writing the config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse timeblock.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not serialize timeblock.toml: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Read timeblock.toml from `dir`. A missing file yields the defaults.
pub fn read_config(dir: &Path) -> Result<Config, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

pub fn write_config(dir: &Path, config: &Config) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config)?;
    fs::write(dir.join(CONFIG_FILE), text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = read_config(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.vault.file, "tasks.toml");
        assert!(!config.schedule.high_pressure);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[schedule]\nhigh_pressure = true\n").unwrap();
        let config = read_config(dir.path()).unwrap();
        assert!(config.schedule.high_pressure);
        assert_eq!(config.vault.file, "tasks.toml");
    }

    #[test]
    fn malformed_file_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[schedule\n").unwrap();
        assert!(matches!(
            read_config(dir.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.schedule.high_pressure = true;
        config.vault.file = "work.toml".into();
        write_config(dir.path(), &config).unwrap();
        assert_eq!(read_config(dir.path()).unwrap(), config);
    }
}
