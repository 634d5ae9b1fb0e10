//! Service configuration for the launcher front-end.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config at {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to create config parent directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub launch: LaunchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Persisted roster document.
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
    /// Root of the per-character preference folders.
    #[serde(default)]
    pub prefs_root: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            prefs_root: None,
        }
    }
}

/// How the external launcher is invoked and how game windows are found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSettings {
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default = "default_launcher_dll")]
    pub launcher_dll: String,
    /// Environment variable that tells the launcher where the game lives.
    #[serde(default = "default_game_path_env")]
    pub game_path_env: String,
    #[serde(default = "default_window_title_prefix")]
    pub window_title_prefix: String,
    #[serde(default = "default_launcher_window_title")]
    pub launcher_window_title: String,
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_early_exit_grace_ms")]
    pub early_exit_grace_ms: u64,
    #[serde(default = "default_close_message_gap_ms")]
    pub close_message_gap_ms: u64,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            launcher_dll: default_launcher_dll(),
            game_path_env: default_game_path_env(),
            window_title_prefix: default_window_title_prefix(),
            launcher_window_title: default_launcher_window_title(),
            settle_delay_secs: default_settle_delay_secs(),
            early_exit_grace_ms: default_early_exit_grace_ms(),
            close_message_gap_ms: default_close_message_gap_ms(),
        }
    }
}

impl LaunchSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn early_exit_grace(&self) -> Duration {
        Duration::from_millis(self.early_exit_grace_ms)
    }

    pub fn close_message_gap(&self) -> Duration {
        Duration::from_millis(self.close_message_gap_ms)
    }
}

pub fn parse_app_config(contents: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn load_app_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_app_config(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}

/// Like [`load_app_config`], but a missing file yields the defaults.
pub fn load_app_config_or_default(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Ok(AppConfig::default());
    }
    load_app_config(path_ref)
}

pub fn save_app_config(path: impl AsRef<Path>, config: &AppConfig) -> Result<(), ConfigError> {
    let path_ref = path.as_ref();
    let parent = path_ref
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf);
    if let Some(parent_dir) = parent {
        fs::create_dir_all(&parent_dir).map_err(|source| ConfigError::CreateDir {
            path: parent_dir,
            source,
        })?;
    }

    let body = toml::to_string_pretty(config).map_err(|source| ConfigError::Serialize {
        path: path_ref.to_path_buf(),
        source,
    })?;
    fs::write(path_ref, body).map_err(|source| ConfigError::Write {
        path: path_ref.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("aodeck-settings.json")
}

fn default_runtime() -> String {
    "dotnet".to_string()
}

fn default_launcher_dll() -> String {
    "AOQuickLauncher.dll".to_string()
}

fn default_game_path_env() -> String {
    "AOPath".to_string()
}

fn default_window_title_prefix() -> String {
    "Anarchy Online - ".to_string()
}

fn default_launcher_window_title() -> String {
    "Knows Modded AO#".to_string()
}

fn default_settle_delay_secs() -> u64 {
    5
}

fn default_early_exit_grace_ms() -> u64 {
    500
}

fn default_close_message_gap_ms() -> u64 {
    100
}
