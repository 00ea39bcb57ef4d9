//! Configuration for taskhub.
//!
//! Values come from a YAML file, then environment overrides, then CLI flags
//! (applied by `main`). Every key has a default so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default config location relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "taskhub/config.yaml";

/// Longest retention window accepted from config or the command line.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("auth.secret_key is not set (use the config file or TASKHUB_SECRET_KEY)")]
    MissingSecret,
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidSchedule { expr: String, reason: String },
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub web: WebConfig,
}

/// API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the API server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("taskhub/taskhub.db")
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

/// Token signing and lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens. Required to serve.
    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,

    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_secs: default_refresh_ttl(),
        }
    }
}

fn default_access_ttl() -> i64 {
    300
}

fn default_refresh_ttl() -> i64 {
    86_400
}

/// Page size defaults and caps per listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_task_page_size")]
    pub task_page_size: u64,
    #[serde(default = "default_task_max_page_size")]
    pub task_max_page_size: u64,
    #[serde(default = "default_user_page_size")]
    pub user_page_size: u64,
    #[serde(default = "default_user_max_page_size")]
    pub user_max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            task_page_size: default_task_page_size(),
            task_max_page_size: default_task_max_page_size(),
            user_page_size: default_user_page_size(),
            user_max_page_size: default_user_max_page_size(),
        }
    }
}

fn default_task_page_size() -> u64 {
    10
}

fn default_task_max_page_size() -> u64 {
    30
}

fn default_user_page_size() -> u64 {
    10
}

fn default_user_max_page_size() -> u64 {
    20
}

/// Maintenance job cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between overdue sweeps.
    #[serde(default = "default_overdue_interval")]
    pub overdue_interval_secs: u64,

    /// Cron expression (with seconds, UTC) for the archive cleanup.
    #[serde(default = "default_cleanup_schedule")]
    pub cleanup_schedule: String,

    /// Archived tasks older than this many days are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overdue_interval_secs: default_overdue_interval(),
            cleanup_schedule: default_cleanup_schedule(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_overdue_interval() -> u64 {
    60
}

fn default_cleanup_schedule() -> String {
    "0 30 8 * * *".to_string()
}

fn default_retention_days() -> i64 {
    30
}

/// Browser front end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the API server the front end relays to.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    /// Sessions unused for this long are dropped.
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_web_listen_addr(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            session_cookie: default_session_cookie(),
            session_idle_secs: default_session_idle(),
        }
    }
}

fn default_web_listen_addr() -> String {
    "0.0.0.0:8001".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_session_cookie() -> String {
    "sessionid".to_string()
}

fn default_session_idle() -> u64 {
    86_400
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Locate and load the config file, then apply environment overrides.
    ///
    /// An explicit path (argument or `TASKHUB_CONFIG_PATH`) must exist. Otherwise
    /// `taskhub/config.yaml` and the per-user config directory are tried before
    /// falling back to defaults. Returns the config and the file it came from.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("TASKHUB_CONFIG_PATH").ok().map(PathBuf::from));

        let (mut config, used) = match explicit {
            Some(path) => (Self::load(&path)?, Some(path)),
            None => {
                let mut candidates = vec![PathBuf::from(DEFAULT_CONFIG_PATH)];
                if let Some(dir) = dirs::config_dir() {
                    candidates.push(dir.join("taskhub").join("config.yaml"));
                }
                match candidates.into_iter().find(|p| p.is_file()) {
                    Some(path) => (Self::load(&path)?, Some(path)),
                    None => (Self::default(), None),
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok((config, used))
    }

    /// Apply `TASKHUB_*` overrides using the given variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("TASKHUB_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }
        if let Some(addr) = lookup("TASKHUB_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(secret) = lookup("TASKHUB_SECRET_KEY") {
            self.auth.secret_key = Some(secret);
        }
        if let Some(days) = lookup("TASKHUB_RETENTION_DAYS") {
            self.scheduler.retention_days =
                days.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    key: "TASKHUB_RETENTION_DAYS",
                    reason: format!("{}: {:?}", e, days),
                })?;
        }
        if let Some(addr) = lookup("TASKHUB_WEB_LISTEN_ADDR") {
            self.web.listen_addr = addr;
        }
        if let Some(url) = lookup("TASKHUB_API_BASE_URL") {
            self.web.api_base_url = url;
        }
        Ok(())
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        cron::Schedule::from_str(&self.scheduler.cleanup_schedule).map_err(|e| {
            ConfigError::InvalidSchedule {
                expr: self.scheduler.cleanup_schedule.clone(),
                reason: e.to_string(),
            }
        })?;

        if self.web.session_idle_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "web.session_idle_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scheduler.overdue_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.overdue_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0..=MAX_RETENTION_DAYS).contains(&self.scheduler.retention_days) {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.retention_days",
                reason: format!("must be between 0 and {}", MAX_RETENTION_DAYS),
            });
        }

        let p = &self.pagination;
        for (key, default, max) in [
            ("pagination.task_page_size", p.task_page_size, p.task_max_page_size),
            ("pagination.user_page_size", p.user_page_size, p.user_max_page_size),
        ] {
            if default == 0 || default > max {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: format!("default {} must be between 1 and max {}", default, max),
                });
            }
        }

        if self.auth.access_token_ttl_secs <= 0 || self.auth.refresh_token_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "auth",
                reason: "token lifetimes must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// The signing secret, which must be non-empty.
    pub fn secret_key(&self) -> Result<&str, ConfigError> {
        match self.auth.secret_key.as_deref() {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(ConfigError::MissingSecret),
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
