//! User configuration: `config.toml` in the app directory plus environment
//! overrides

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::provider::google::DEFAULT_TASKLIST;
use crate::sync::{RetryPolicy, SyncOptions};

pub const APP_DIR_ENV: &str = "TASKSYNC_HOME";
pub const CONFIG_FILE: &str = "config.toml";
pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const TOKEN_FILE: &str = "token.json";
pub const DOTENV_FILE: &str = ".env";
pub const MIN_INTERVAL_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot determine the application directory (set TASKSYNC_HOME)")]
    NoAppDir,

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid env file {}: {source}", .path.display())]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Todoist API token is not set (set TODOIST_API_TOKEN or [todoist].api_token)")]
    MissingTodoistToken,

    #[error("Google credentials not found at {}", .0.display())]
    MissingGoogleCredentials(PathBuf),
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub todoist: TodoistConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sync: SyncConfig::default(),
            google: GoogleConfig::default(),
            todoist: TodoistConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub dry_run: bool,

    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(default)]
    pub tasks_created_after: Option<String>,

    #[serde(default)]
    pub skip_descriptions: bool,

    #[serde(default)]
    pub retry_pending_deletions: bool,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            dry_run: false,
            tasks_created_after: None,
            skip_descriptions: false,
            retry_pending_deletions: false,
            retry_attempts: default_retry_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_retry_attempts() -> u32 {
    1
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub credentials_path: Option<String>,

    #[serde(default)]
    pub token_path: Option<String>,

    #[serde(default = "default_tasklist_id")]
    pub tasklist_id: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            token_path: None,
            tasklist_id: default_tasklist_id(),
        }
    }
}

fn default_tasklist_id() -> String {
    DEFAULT_TASKLIST.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoistConfig {
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default)]
    pub project_id: Option<String>,
}

/// Resolve the application directory without creating it.
pub fn get_app_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(APP_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(target_os = "linux")]
    {
        dirs::config_dir()
            .map(|d| d.join("tasksync"))
            .ok_or(ConfigError::NoAppDir)
    }

    #[cfg(not(target_os = "linux"))]
    {
        dirs::home_dir()
            .map(|d| d.join(".tasksync"))
            .ok_or(ConfigError::NoAppDir)
    }
}

pub fn config_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE)
}

/// Read `KEY=value` pairs from a `.env` file without touching the process
/// environment. A missing file yields no values.
pub fn load_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let dotenv_err = |source| ConfigError::Dotenv {
        path: path.to_path_buf(),
        source,
    };

    let vars = dotenvy::from_path_iter(path)
        .map_err(dotenv_err)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(dotenv_err)?;
    debug!("Loaded {} value(s) from {}", vars.len(), path.display());
    Ok(vars)
}

/// Lookup that prefers `process` and falls back to `.env` values.
fn layered_lookup<F>(
    process: F,
    dotenv: HashMap<String, String>,
) -> impl Fn(&str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    move |key: &str| process(key).or_else(|| dotenv.get(key).cloned())
}

impl Config {
    /// Load `config.toml` from the app directory and apply environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let app_dir = get_app_dir()?;
        let mut config = Self::load_from(&config_path(&app_dir))?;
        let dotenv = load_dotenv(Path::new(DOTENV_FILE))?;
        config.apply_env_overrides(layered_lookup(|key| std::env::var(key).ok(), dotenv))?;
        config.validate()?;
        Ok(config)
    }

    /// Read one config file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("TODOIST_API_TOKEN") {
            self.todoist.api_token = Some(token.trim().to_string());
        }
        if let Some(path) = var("GOOGLE_CREDENTIALS_PATH") {
            self.google.credentials_path = Some(path);
        }
        if let Some(path) = var("GOOGLE_TOKEN_PATH") {
            self.google.token_path = Some(path);
        }
        if let Some(raw) = var("SYNC_INTERVAL") {
            self.sync.interval_secs = raw.trim().parse().map_err(|_| {
                ConfigError::invalid(
                    "SYNC_INTERVAL",
                    format!("{:?} is not a number of seconds", raw),
                )
            })?;
        }
        if let Some(raw) = var("DRY_RUN") {
            self.sync.dry_run = parse_bool("DRY_RUN", &raw)?;
        }
        if let Some(raw) = var("SKIP_DESCRIPTIONS") {
            self.sync.skip_descriptions = parse_bool("SKIP_DESCRIPTIONS", &raw)?;
        }
        if let Some(raw) = var("TASKS_CREATED_AFTER") {
            self.sync.tasks_created_after = Some(raw.trim().to_string());
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level.trim().to_lowercase();
        }
        Ok(())
    }

    /// Check values that do not depend on which command runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_secs < MIN_INTERVAL_SECS {
            return Err(ConfigError::invalid(
                "sync.interval_secs",
                format!(
                    "{} is below the minimum of {} seconds",
                    self.sync.interval_secs, MIN_INTERVAL_SECS
                ),
            ));
        }
        self.created_after()?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn created_after(&self) -> Result<Option<DateTime<Utc>>, ConfigError> {
        let Some(raw) = self.sync.tasks_created_after.as_deref() else {
            return Ok(None);
        };
        parse_cutoff(raw).map(Some).ok_or_else(|| {
            ConfigError::invalid(
                "sync.tasks_created_after",
                format!("{:?} is neither RFC 3339 nor YYYY-MM-DD", raw),
            )
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.sync.retry_attempts,
            Duration::from_millis(self.sync.retry_initial_delay_ms),
        )
    }

    pub fn sync_options(&self) -> Result<SyncOptions, ConfigError> {
        Ok(SyncOptions {
            dry_run: self.sync.dry_run,
            created_after: self.created_after()?,
            skip_descriptions: self.sync.skip_descriptions,
            retry: self.retry_policy(),
        })
    }

    pub fn credentials_path(&self, app_dir: &Path) -> PathBuf {
        match &self.google.credentials_path {
            Some(p) => expand_home(p),
            None => app_dir.join(CREDENTIALS_FILE),
        }
    }

    pub fn token_path(&self, app_dir: &Path) -> PathBuf {
        match &self.google.token_path {
            Some(p) => expand_home(p),
            None => app_dir.join(TOKEN_FILE),
        }
    }

    pub fn todoist_token(&self) -> Result<&str, ConfigError> {
        self.todoist
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingTodoistToken)
    }

    /// Path to an existing Google credentials file
    pub fn require_google_credentials(&self, app_dir: &Path) -> Result<PathBuf, ConfigError> {
        let path = self.credentials_path(app_dir);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::MissingGoogleCredentials(path))
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("{:?} is not a boolean", other))),
    }
}

/// RFC 3339, or a plain date meaning midnight UTC
fn parse_cutoff(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(stripped) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(raw)
}

/// Contents written by `tasksync init`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# tasksync configuration
# Environment variables (TODOIST_API_TOKEN, SYNC_INTERVAL, DRY_RUN, ...) take
# precedence over the values below.

# log_level = "info"

[sync]
# Seconds between passes (minimum 5)
interval_secs = 300
# List and match only, never create or delete
dry_run = false
# Ignore source tasks created before this date (RFC 3339 or YYYY-MM-DD)
# tasks_created_after = "2024-01-01"
skip_descriptions = false
# Remember failed source deletions and retry them on the next pass
retry_pending_deletions = false
# Attempts per create/delete call on transient errors (1 = no retry)
retry_attempts = 1
retry_initial_delay_ms = 500

[google]
# Defaults to credentials.json and token.json next to this file
# credentials_path = "~/Downloads/credentials.json"
# token_path = "token.json"
tasklist_id = "@default"

[todoist]
# api_token = ""
# project_id = ""
"#;
