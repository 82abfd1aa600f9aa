use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_server_uri")]
    pub server_uri: String,
    #[serde(default = "default_namespace_uri")]
    pub namespace_uri: String,
    /// Address of the HTTP inspection surface (health, metrics, browse, GraphQL).
    #[serde(default = "default_bind_http")]
    pub bind_http: String,
}

fn default_endpoint() -> String {
    "opc.tcp://0.0.0.0:4841/freeopcua/server".to_string()
}

fn default_server_uri() -> String {
    "urn://exampleserver.freeopcua.github.io".to_string()
}

fn default_namespace_uri() -> String {
    "http://examples.freeopcua.github.io".to_string()
}

fn default_bind_http() -> String {
    "127.0.0.1:8484".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            server_uri: default_server_uri(),
            namespace_uri: default_namespace_uri(),
            bind_http: default_bind_http(),
        }
    }
}

/// What the scheduler does when a value write is rejected.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Stop the loop on the first failed write.
    #[default]
    FailFast,
    /// Log the failure and carry on with the rest of the tick.
    LogAndContinue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_object_count")]
    pub object_count: usize,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub on_write_failure: WriteFailurePolicy,
}

fn default_object_count() -> usize {
    1000
}

fn default_tick_interval_ms() -> u64 {
    2000
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            object_count: default_object_count(),
            tick_interval_ms: default_tick_interval_ms(),
            on_write_failure: WriteFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_export_path")]
    pub path: PathBuf,
}

fn default_export_path() -> PathBuf {
    PathBuf::from("testServer.db")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { enabled: false, path: default_export_path() }
    }
}

impl Config {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_yaml::from_slice(&bytes)?)
    }
}
