use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// On-disk settings. Every key is optional; missing keys keep their default.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub api_url: Option<String>,
    pub banner_seconds: Option<u64>,
    pub refresh_seconds: Option<u64>,
    pub expiry_delay_ms: Option<u64>,
    pub login_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// How long a banner stays up.
    pub banner_ttl: Duration,
    /// Dashboard auto-refresh interval.
    pub refresh_interval: Duration,
    /// Delay before the login screen after a session expires.
    pub expiry_delay: Duration,
    /// Delay before the dashboard after a successful login.
    pub login_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            banner_ttl: Duration::from_secs(4),
            refresh_interval: Duration::from_secs(300),
            expiry_delay: Duration::from_millis(2000),
            login_delay: Duration::from_millis(1500),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "jobtrack").map(|dirs| dirs.config_dir().join("config.yml"))
}

pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config '{}'", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(ConfigFile::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read config '{}'", path.display())),
    }
}

fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Invalid {key} value '{raw}': {e}, ignoring");
            None
        }
    }
}

impl Config {
    /// Defaults, then the config file, then `JOBTRACK_*` variables, then the
    /// command-line override.
    pub fn load(config_path: Option<&Path>, api_url_override: Option<&str>) -> Result<Self> {
        let file = match config_path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => load_config_file(&path)?,
            None => ConfigFile::default(),
        };
        let config = Self::from_layers(file, |key| std::env::var(key).ok(), api_url_override);
        info!(api_url = %config.api_url, "configuration loaded");
        Ok(config)
    }

    pub fn from_layers(
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
        api_url_override: Option<&str>,
    ) -> Self {
        let mut config = Self::default();

        if let Some(url) = file.api_url {
            config.api_url = url;
        }
        if let Some(secs) = file.banner_seconds {
            config.banner_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = file.refresh_seconds {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = file.expiry_delay_ms {
            config.expiry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.login_delay_ms {
            config.login_delay = Duration::from_millis(ms);
        }

        if let Some(url) = env("JOBTRACK_API_URL").filter(|u| !u.trim().is_empty()) {
            config.api_url = url;
        }
        if let Some(secs) = parse_env(&env, "JOBTRACK_BANNER_SECONDS") {
            config.banner_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env(&env, "JOBTRACK_REFRESH_SECONDS") {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env(&env, "JOBTRACK_EXPIRY_DELAY_MS") {
            config.expiry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env(&env, "JOBTRACK_LOGIN_DELAY_MS") {
            config.login_delay = Duration::from_millis(ms);
        }

        if let Some(url) = api_url_override {
            config.api_url = url.to_string();
        }
        config.api_url = config.api_url.trim().trim_end_matches('/').to_string();
        config
    }
}
