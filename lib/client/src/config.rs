use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_ENGINE_PORT: u16 = 8000;
pub const DEFAULT_EVENT_PORT: u16 = 7070;

/// Connection settings for the engine and event servers.
///
/// Read once when the engine builds its clients; later changes to a copy
/// have no effect on an existing engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_engine_port")]
    pub engine_port: u16,

    #[serde(default = "default_event_port")]
    pub event_port: u16,

    /// Sent as `accessKey` on every event request
    #[serde(default)]
    pub access_key: Option<String>,

    /// Upper bound on concurrent event requests
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Per-request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_engine_port() -> u16 {
    DEFAULT_ENGINE_PORT
}

fn default_event_port() -> u16 {
    DEFAULT_EVENT_PORT
}

fn default_threads() -> usize {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            engine_port: default_engine_port(),
            event_port: default_event_port(),
            access_key: None,
            threads: default_threads(),
            timeout_secs: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("host cannot be empty".to_string()));
        }
        if self.threads == 0 {
            return Err(Error::InvalidConfig("threads must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Query endpoint of the engine server
    pub fn engine_url(&self) -> String {
        format!("{}/queries.json", base_url(&self.host, self.engine_port))
    }

    /// Event endpoint of the event server, without the access key
    pub fn events_url(&self) -> String {
        format!("{}/events.json", base_url(&self.host, self.event_port))
    }
}

// `host` may already carry a scheme
fn base_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}
