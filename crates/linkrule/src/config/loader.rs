use std::path::{Path, PathBuf};

use crate::config::settings::Settings;
use crate::error::ConfigError;

/// `~/.linkrule/config.json`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".linkrule").join("config.json"))
}

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_json::from_str(content)?;

    validate_settings(&settings)?;

    Ok(settings)
}

/// Loads `path` when given (it must exist), otherwise the default settings
/// file if present, otherwise built-in defaults.
pub fn load_settings_or_default(path: Option<&Path>) -> Result<Settings, ConfigError> {
    if let Some(path) = path {
        return load_settings(path);
    }

    match default_settings_path() {
        Some(default) if default.is_file() => {
            log::debug!("Loading settings from {}", default.display());
            load_settings(default)
        }
        _ => Ok(Settings::default()),
    }
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "batch_size must be at least 1".to_string(),
        });
    }

    if let Some(path) = &settings.database_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "database_path must not be empty".to_string(),
            });
        }
    }

    Ok(())
}
