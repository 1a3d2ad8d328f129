// SPDX-License-Identifier: MIT

//! On-disk configuration: a TOML file matching the layout documented in
//! the deployment guide, resolved via [`crate::env`]'s state-dir rules.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to read config file at {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse config file at {path}: {source}")]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

#[derive(Debug, Clone, Deserialize)]
pub struct LdapConfig {
    pub uri: String,
    pub bind_dn: String,
    pub bind_pw_file: PathBuf,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub host: String,
    #[serde(default = "default_notifier_port")]
    pub port: u16,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// MiB; `<= 0` disables the check.
    #[serde(default = "default_freespace")]
    pub freespace: i64,
    #[serde(default = "default_timeout_scans")]
    pub timeout_scans: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HandlersConfig {
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JournalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

fn default_retries() -> u32 {
    3
}
fn default_notifier_port() -> u16 {
    6669
}
fn default_freespace() -> i64 {
    50
}
fn default_timeout_scans() -> u64 {
    7200
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ldap: LdapConfig,
    pub notifier: NotifierConfig,
    #[serde(default = "ListenerConfig::default_config")]
    pub listener: ListenerConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub handlers: HandlersConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ListenerConfig {
    fn default_config() -> Self {
        Self { freespace: default_freespace(), timeout_scans: default_timeout_scans() }
    }
}

impl Config {
    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })
    }

    /// Load using [`crate::env::config_path`]'s resolution order.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&crate::env::config_path()?)
    }
}
