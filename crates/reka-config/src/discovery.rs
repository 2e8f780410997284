//! Config file discovery

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable pointing directly at a config file
pub const CONFIG_PATH_ENV: &str = "REKA_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["reka.kdl", ".reka.kdl"];

/// reka's directory under the platform config dir, created on demand
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("reka");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the config file to load
///
/// Search order:
/// 1. `explicit` (the `--config` flag); it must exist
/// 2. `REKA_CONFIG_PATH`
/// 3. current directory: reka.kdl, .reka.kdl
/// 4. ~/.config/reka/reka.kdl
#[tracing::instrument]
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::InvalidConfig(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(path_str) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(&path_str);
        if path.is_file() {
            info!(config_path = %path.display(), "Using config from environment variable");
            return Ok(path);
        }
        warn!(env_path = %path_str, "REKA_CONFIG_PATH is set but file does not exist");
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_config_in(&current_dir) {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("reka").join("reka.kdl");
        if global_config.is_file() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Look for a config file in one directory
pub fn find_config_in(dir: &Path) -> Option<PathBuf> {
    debug!(dir = %dir.display(), "Searching for config file");
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_explicit_path_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.kdl");
        fs::write(&path, "// custom").unwrap();

        assert_eq!(find_config_file(Some(&path)).unwrap(), path);
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("missing.kdl");

        assert!(matches!(
            find_config_file(Some(&path)),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_find_config_in_prefers_visible_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(".reka.kdl"), "// hidden").unwrap();
        fs::write(temp_dir.path().join("reka.kdl"), "// visible").unwrap();

        let found = find_config_in(temp_dir.path()).unwrap();
        assert!(found.ends_with("reka.kdl"));
        assert!(!found.ends_with(".reka.kdl"));
    }

    #[test]
    fn test_find_config_in_empty_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(find_config_in(temp_dir.path()).is_none());
    }

    #[test]
    #[serial]
    fn test_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("from-env.kdl");
        fs::write(&config_path, "// env").unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }

        let result = find_config_file(None).unwrap();
        assert_eq!(result, config_path);

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
    }
}
