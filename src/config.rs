//! Layered dashboard configuration.
//!
//! Defaults are overridden, in order, by the user config file, the project
//! config file, an explicit `--config` file, the `KAFKASYNC_API_URL`
//! environment variable and finally command line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/downloads";
pub const API_URL_ENV: &str = "KAFKASYNC_API_URL";
pub const PROJECT_CONFIG_FILE: &str = "kafkasync.toml";

/// Anything shorter turns polling into a busy loop against the API server.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_api_url() -> String {
    return DEFAULT_API_URL.to_string();
}

fn default_timeout_ms() -> u64 {
    return 10_000;
}

fn default_interval_ms() -> u64 {
    return 2_000;
}

fn default_log_level() -> String {
    return "info".to_string();
}

impl Default for ApiConfig {
    fn default() -> Self {
        return Self {
            url: default_api_url(),
            timeout_ms: default_timeout_ms(),
        };
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        return Self {
            interval_ms: default_interval_ms(),
        };
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        return Self {
            level: default_log_level(),
            file: None,
        };
    }
}

impl ApiConfig {
    pub fn parsed_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        return Ok(url);
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        return Duration::from_millis(self.interval_ms);
    }
}

/// A config file as written on disk. Every field is optional so a file only
/// overrides what it mentions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    #[serde(default)]
    api: ApiLayer,
    #[serde(default)]
    poll: PollLayer,
    #[serde(default)]
    log: LogLayer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApiLayer {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PollLayer {
    interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogLayer {
    level: Option<String>,
    file: Option<PathBuf>,
}

/// Values given on the command line. `None` leaves the layered value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl DashboardConfig {
    /// Loads the full hierarchy from the standard locations.
    pub fn load_hierarchy(cli: &CliOverrides) -> Result<Self, ConfigError> {
        let user_path = dirs::config_dir().map(|dir| user_config_path(&dir));
        let project_path = std::env::current_dir()
            .ok()
            .map(|dir| dir.join(PROJECT_CONFIG_FILE));
        let env_url = std::env::var(API_URL_ENV).ok();

        return Self::load_from(user_path.as_deref(), project_path.as_deref(), env_url, cli);
    }

    /// Same as [`Self::load_hierarchy`] with every location passed in.</br>
    /// Missing user and project files are skipped; an explicit `--config` file must exist.
    pub fn load_from(
        user_path: Option<&Path>,
        project_path: Option<&Path>,
        env_url: Option<String>,
        cli: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = DashboardConfig::default();

        for path in [user_path, project_path].into_iter().flatten() {
            if path.is_file() {
                config.merge(load_layer(path)?);
            }
        }

        if let Some(path) = cli.config_path.as_deref() {
            config.merge(load_layer(path)?);
        }

        if let Some(url) = env_url.filter(|url| !url.trim().is_empty()) {
            config.api.url = url;
        }

        config.apply_cli(cli);
        config.validate()?;
        return Ok(config);
    }

    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(url) = layer.api.url {
            self.api.url = url;
        }
        if let Some(timeout_ms) = layer.api.timeout_ms {
            self.api.timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = layer.poll.interval_ms {
            self.poll.interval_ms = interval_ms;
        }
        if let Some(level) = layer.log.level {
            self.log.level = level;
        }
        if let Some(file) = layer.log.file {
            self.log.file = Some(file);
        }
    }

    fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(url) = &cli.api_url {
            self.api.url = url.clone();
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            self.api.timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = cli.interval_ms {
            self.poll.interval_ms = interval_ms;
        }
        if let Some(level) = &cli.log_level {
            self.log.level = level.clone();
        }
        if let Some(file) = &cli.log_file {
            self.log.file = Some(file.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.parsed_url()?;

        if self.api.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        if self.poll.interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::IntervalTooShort {
                min_ms: MIN_POLL_INTERVAL_MS,
                actual_ms: self.poll.interval_ms,
            });
        }

        return Ok(());
    }
}

fn user_config_path(config_dir: &Path) -> PathBuf {
    return config_dir.join("kafkasync").join("dashboard.toml");
}

fn load_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    return toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::load_from(None, None, None, &CliOverrides::default()).unwrap();
        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.poll.interval(), Duration::from_millis(2000));
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.file, None);
    }

    #[test]
    fn test_missing_layer_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let config =
            DashboardConfig::load_from(Some(missing.as_path()), Some(missing.as_path()), None, &CliOverrides::default())
                .unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = TempDir::new().unwrap();
        let user = write(
            &dir,
            "user.toml",
            "[api]\nurl = \"http://user:1/api/downloads\"\ntimeout_ms = 500\n\n[log]\nlevel = \"debug\"\n",
        );
        let project = write(&dir, "project.toml", "[api]\nurl = \"http://project:2/api/downloads\"\n");

        let config =
            DashboardConfig::load_from(Some(user.as_path()), Some(project.as_path()), None, &CliOverrides::default())
                .unwrap();
        assert_eq!(config.api.url, "http://project:2/api/downloads");
        assert_eq!(config.api.timeout_ms, 500);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_env_then_cli_win() {
        let dir = TempDir::new().unwrap();
        let explicit = write(&dir, "explicit.toml", "[poll]\ninterval_ms = 5000\n");

        let env_only = CliOverrides { config_path: Some(explicit.clone()), ..CliOverrides::default() };
        let config = DashboardConfig::load_from(
            None,
            None,
            Some("http://env:3/api/downloads".to_owned()),
            &env_only,
        )
        .unwrap();
        assert_eq!(config.api.url, "http://env:3/api/downloads");
        assert_eq!(config.poll.interval_ms, 5000);

        let cli = CliOverrides {
            config_path: Some(explicit),
            api_url: Some("http://cli:4/api/downloads".to_owned()),
            interval_ms: Some(1000),
            ..CliOverrides::default()
        };
        let config =
            DashboardConfig::load_from(None, None, Some("http://env:3/api/downloads".to_owned()), &cli)
                .unwrap();
        assert_eq!(config.api.url, "http://cli:4/api/downloads");
        assert_eq!(config.poll.interval_ms, 1000);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let cli = CliOverrides {
            config_path: Some(dir.path().join("missing.toml")),
            ..CliOverrides::default()
        };
        let result = DashboardConfig::load_from(None, None, None, &cli);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let bad = write(&dir, "bad.toml", "[api]\nendpoint = \"http://x\"\n");
        let result = DashboardConfig::load_from(Some(bad.as_path()), None, None, &CliOverrides::default());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validation() {
        let mut config = DashboardConfig::default();
        config.poll.interval_ms = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IntervalTooShort { min_ms: 100, actual_ms: 10 })
        ));

        let mut config = DashboardConfig::default();
        config.api.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));

        let mut config = DashboardConfig::default();
        config.api.url = "ftp://host/api/downloads".to_owned();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_blank_env_url_is_ignored() {
        let config =
            DashboardConfig::load_from(None, None, Some("  ".to_owned()), &CliOverrides::default())
                .unwrap();
        assert_eq!(config.api.url, DEFAULT_API_URL);
    }
}
