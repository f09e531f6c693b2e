//! Configuration loading for nlip-mesh.
#![allow(dead_code)]
//!
//! Settings live in ~/.nlip-mesh/settings.json. Every agent process reads the
//! same file: the coordinator takes its bind address, timeouts, and the
//! registry entries from it; workers take their bind address and provider
//! keys. Provider keys may also come from the environment.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Get the nlip-mesh home directory (~/.nlip-mesh).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".nlip-mesh"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.nlip-mesh/settings.json.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load and validate settings from an explicit path.
pub fn load_settings_from(path: &std::path::Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or fall back to the built-in localhost topology.
pub fn load_settings_or_default() -> Settings {
    match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings: {}, using defaults", e);
            Settings::default()
        }
    }
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    for entry in &settings.agents {
        reqwest::Url::parse(&entry.address).map_err(|e| {
            Error::Config(format!(
                "agent '{}' has invalid address '{}': {}",
                entry.name, entry.address, e
            ))
        })?;
    }

    for (capability, bind) in &settings.workers {
        if capability.is_empty() {
            return Err(Error::Config("worker capability name is empty".to_string()));
        }
        if bind.port == 0 {
            return Err(Error::Config(format!(
                "worker '{}' has no port configured",
                capability
            )));
        }
    }

    Ok(())
}

/// Coordinator service configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CoordinatorConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_coordinator_port")]
    pub port: u16,
    /// Deadline for one whole delegated request, subtasks included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Per-call timeout for a single transport send.
    #[serde(default = "default_transport_timeout_secs")]
    pub transport_timeout_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_coordinator_port(),
            request_timeout_secs: default_request_timeout_secs(),
            transport_timeout_secs: default_transport_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_coordinator_port() -> u16 {
    8012
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_transport_timeout_secs() -> u64 {
    20
}

/// Bind address for one worker process.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BindConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

/// One registry entry: a worker process and the capabilities it serves.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AgentEntry {
    pub name: String,
    pub address: String,
    pub capabilities: Vec<String>,
}

/// Third-party provider credentials.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Providers {
    pub news_api_key: Option<String>,
}

/// nlip-mesh settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub workers: HashMap<String, BindConfig>,

    #[serde(default)]
    pub agents: Vec<AgentEntry>,

    #[serde(default)]
    pub providers: Providers,
}

impl Settings {
    /// News provider key, settings file first, then environment.
    pub fn news_api_key(&self) -> Option<String> {
        self.providers
            .news_api_key
            .clone()
            .or_else(|| std::env::var("NEWS_API_KEY").ok())
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut workers = HashMap::new();
        workers.insert(
            "news".to_string(),
            BindConfig { host: default_host(), port: 8013 },
        );
        workers.insert(
            "stock".to_string(),
            BindConfig { host: default_host(), port: 8014 },
        );
        workers.insert(
            "weather".to_string(),
            BindConfig { host: default_host(), port: 8015 },
        );

        Self {
            coordinator: CoordinatorConfig::default(),
            workers,
            agents: vec![
                AgentEntry {
                    name: "news-worker".to_string(),
                    address: "http://127.0.0.1:8013".to_string(),
                    capabilities: vec!["news".to_string()],
                },
                AgentEntry {
                    name: "stock-worker".to_string(),
                    address: "http://127.0.0.1:8014".to_string(),
                    capabilities: vec!["stock".to_string()],
                },
                AgentEntry {
                    name: "weather-worker".to_string(),
                    address: "http://127.0.0.1:8015".to_string(),
                    capabilities: vec!["weather".to_string()],
                },
            ],
            providers: Providers::default(),
        }
    }
}
