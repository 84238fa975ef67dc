pub mod types;

pub use types::OptimizerConfig;

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".chart-optimizer.toml";

/// Get the global config file path (~/.chart-optimizer.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (<dir>/.chart-optimizer.toml)
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Parse and validate one config file.
pub fn load_config_file(path: &Path) -> Result<OptimizerConfig> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }
    let content = fs::read_to_string(path)?;
    let config: OptimizerConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration.
///
/// An explicit path must exist and parse. Otherwise the local file is tried,
/// then the global one; a discovered file that fails to load is skipped with
/// a warning and defaults are used if nothing loads.
pub fn load_config(explicit: Option<&Path>) -> Result<OptimizerConfig> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    let candidates = std::env::current_dir()
        .ok()
        .map(|cwd| local_config_path(&cwd))
        .into_iter()
        .chain(global_config_path());

    for candidate in candidates {
        if !candidate.exists() {
            continue;
        }
        match load_config_file(&candidate) {
            Ok(config) => {
                log::debug!("Loaded config from {}", candidate.display());
                return Ok(config);
            }
            Err(e) => log::warn!("Ignoring config {}: {}", candidate.display(), e),
        }
    }

    Ok(OptimizerConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OptimizerError;
    use std::io::Write;

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(OptimizerError::Config(ConfigError::NotFound(_)))
        ));
    }

    #[test]
    fn test_explicit_path_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[impact\noverhead_pct = ").unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(OptimizerError::Toml(_))
        ));
    }

    #[test]
    fn test_explicit_path_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[verification]\nparallelism = 2\n").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.verification.parallelism, 2);
        assert!(config.verification.enabled);
    }
}
