//! Configuration system for the devstore.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskorbit-devstore/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

/// Errors that can occur when loading devstore configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct DevStoreConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    seed_file: Option<PathBuf>,
}

/// CLI arguments for the devstore.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "In-memory TaskOrbit task API")]
pub struct DevStoreCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "TASKORBIT_DEVSTORE_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskorbit-devstore/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file with an array of tasks to preload.
    #[arg(long)]
    pub seed: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKORBIT_DEVSTORE_LOG")]
    pub log_level: String,
}

/// Fully resolved devstore configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevStoreConfig {
    /// Address to bind the server to (e.g., `127.0.0.1:5000`).
    pub bind_addr: String,
    /// Tasks to preload, if any.
    pub seed_file: Option<PathBuf>,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for DevStoreConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            seed_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl DevStoreConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &DevStoreCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    fn resolve(cli: &DevStoreCliArgs, file: &DevStoreConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            seed_file: cli.seed.clone().or_else(|| file.server.seed_file.clone()),
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<DevStoreConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(DevStoreConfigFile::default());
    };
    let path = config_dir.join("taskorbit-devstore").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DevStoreConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
