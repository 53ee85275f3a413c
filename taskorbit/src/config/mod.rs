//! Configuration system for the `taskorbit` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskorbit/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use taskorbit_proto::Category;

use crate::session::SessionUser;

/// Default root of the hosted task API.
pub const DEFAULT_API_BASE_URL: &str = "https://task-orbit-server-side.vercel.app";

/// Errors that can occur when loading configuration.
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

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    session: SessionFileConfig,
    sync: SyncFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    sync_timeout_secs: Option<u64>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    event_buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    // -- API --
    /// Root URL of the task API.
    pub api_base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Upper bound on one remote write, after which it is rolled back.
    pub sync_timeout: Duration,

    // -- Session --
    /// Signed-in user's email.
    pub email: Option<String>,
    /// Signed-in user's display name.
    pub display_name: Option<String>,
    /// Signed-in user's avatar URL.
    pub photo_url: Option<String>,

    // -- Sync --
    /// Buffer size for the dispatcher's event channel.
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            sync_timeout: Duration::from_secs(10),
            email: None,
            display_name: None,
            photo_url: None,
            event_buffer: 64,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            api_base_url: cli
                .api_url
                .clone()
                .or_else(|| file.api.base_url.clone())
                .unwrap_or(defaults.api_base_url),
            request_timeout: file
                .api
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            sync_timeout: file
                .api
                .sync_timeout_secs
                .map_or(defaults.sync_timeout, Duration::from_secs),
            email: cli.email.clone().or_else(|| file.session.email.clone()),
            display_name: cli
                .display_name
                .clone()
                .or_else(|| file.session.display_name.clone()),
            photo_url: file.session.photo_url.clone(),
            event_buffer: file.sync.event_buffer.unwrap_or(defaults.event_buffer),
        }
    }

    /// The configured session user, if an email is set.
    ///
    /// The display name falls back to the email's local part.
    #[must_use]
    pub fn session_user(&self) -> Option<SessionUser> {
        let email = self.email.clone().filter(|e| !e.trim().is_empty())?;
        let display_name = self.display_name.clone().unwrap_or_else(|| {
            email
                .split_once('@')
                .map_or_else(|| email.clone(), |(local, _)| local.to_string())
        });
        Some(SessionUser {
            email,
            display_name,
            photo_url: self.photo_url.clone(),
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Kanban task board with optimistic sync")]
pub struct CliArgs {
    /// Root URL of the task API.
    #[arg(long, env = "TASKORBIT_API_URL")]
    pub api_url: Option<String>,

    /// Email of the user whose board to open.
    #[arg(long, env = "TASKORBIT_EMAIL")]
    pub email: Option<String>,

    /// Display name recorded as author of new tasks.
    #[arg(long, env = "TASKORBIT_NAME")]
    pub display_name: Option<String>,

    /// Path to config file (default: `~/.config/taskorbit/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", env = "TASKORBIT_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do (default: print the board).
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Board commands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the three columns.
    Board,

    /// Add a task.
    Add {
        /// Title, 1-50 characters.
        #[arg(long)]
        title: String,
        /// Description, up to 200 characters.
        #[arg(long, default_value = "")]
        description: String,
        /// Column: todo, in-progress or done.
        #[arg(long, default_value = "todo")]
        category: Category,
    },

    /// Move a task to another column or next to another task.
    Move {
        /// Task to move.
        id: String,
        /// Append to this column.
        #[arg(long, conflicts_with = "over", required_unless_present = "over")]
        to: Option<Category>,
        /// Drop onto this task's slot.
        #[arg(long)]
        over: Option<String>,
    },

    /// Change a task's title and/or description.
    Edit {
        /// Task to edit.
        id: String,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New description.
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a task permanently.
    Delete {
        /// Task to delete.
        id: String,
    },

    /// Show the configured session user.
    Whoami,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskorbit").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
