// Configuration loading and parsing (volley.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use volley_core::EngineConfig;

const CONFIG_FILE: &str = "volley.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// volley.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub commentary: CommentaryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommentaryConfig {
    pub enabled: bool,
    /// Upper bound on a single commentary request.
    pub timeout_secs: u64,
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        CommentaryConfig {
            enabled: true,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
    /// Log to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "volley_core=info,volley_app=info,warn".into(),
            log_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/volley.toml` relative to `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<AppConfig, ConfigError> {
    load_config_file(&base_dir.join("config").join(CONFIG_FILE))
}

pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = read_file(path)?;
    let config: AppConfig = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Resolve configuration from the working directory, then the platform
/// config directory, then built-in defaults. A file that exists but fails
/// to parse or validate is an error, not a fallback.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("config").join(CONFIG_FILE));
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", "volley-stats") {
        candidates.push(dirs.config_dir().join(CONFIG_FILE));
    }

    match candidates.into_iter().find(|p| p.is_file()) {
        Some(path) => load_config_file(&path),
        None => Ok(AppConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let threshold = config.engine.match_threshold;
    if !(1..=100).contains(&threshold) {
        return Err(ConfigError::ValidationError {
            field: "engine.match_threshold".into(),
            message: format!("must be between 1 and 100 inclusive, got {threshold}"),
        });
    }

    if config.engine.recent_window == 0 {
        return Err(ConfigError::ValidationError {
            field: "engine.recent_window".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.commentary.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "commentary.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.filter".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}
