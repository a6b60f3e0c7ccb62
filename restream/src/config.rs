//! Instance configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration of a restream instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestreamConfig {
    /// Identifier of this instance.
    #[serde(default)]
    pub id: String,

    /// Arbitrary display name.
    #[serde(default)]
    pub name: String,

    /// Maximum number of processes with a "start" order.
    /// Set to 0 for no limit.
    #[serde(default)]
    pub max_processes: u64,

    /// Interval between disk quota checks in seconds.
    #[serde(default = "default_disk_watch_interval_secs")]
    pub disk_watch_interval_secs: u64,

    /// Stale timeout applied to probe runs in seconds.
    #[serde(default = "default_probe_stale_timeout_secs")]
    pub probe_stale_timeout_secs: u64,

    /// Host part of the playout addresses handed out by `get_playout`.
    #[serde(default = "default_playout_host")]
    pub playout_host: String,
}

fn default_disk_watch_interval_secs() -> u64 {
    10
}

fn default_probe_stale_timeout_secs() -> u64 {
    20
}

fn default_playout_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for RestreamConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            max_processes: 0,
            disk_watch_interval_secs: default_disk_watch_interval_secs(),
            probe_stale_timeout_secs: default_probe_stale_timeout_secs(),
            playout_host: default_playout_host(),
        }
    }
}

impl RestreamConfig {
    /// Create a new RestreamConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `RESTREAM_*` environment variables, reading a
    /// `.env` file first if there is one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(id) = lookup("RESTREAM_ID") {
            config.id = id;
        }
        if let Some(name) = lookup("RESTREAM_NAME") {
            config.name = name;
        }
        if let Some(value) = lookup("RESTREAM_MAX_PROCESSES") {
            config.max_processes = parse_number("RESTREAM_MAX_PROCESSES", &value)?;
        }
        if let Some(value) = lookup("RESTREAM_DISK_WATCH_INTERVAL") {
            config.disk_watch_interval_secs = parse_number("RESTREAM_DISK_WATCH_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("RESTREAM_PROBE_TIMEOUT") {
            config.probe_stale_timeout_secs = parse_number("RESTREAM_PROBE_TIMEOUT", &value)?;
        }
        if let Some(host) = lookup("RESTREAM_PLAYOUT_HOST") {
            config.playout_host = host;
        }

        Ok(config)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_processes(mut self, max: u64) -> Self {
        self.max_processes = max;
        self
    }

    pub fn with_disk_watch_interval_secs(mut self, secs: u64) -> Self {
        self.disk_watch_interval_secs = secs;
        self
    }

    pub fn with_probe_stale_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_stale_timeout_secs = secs;
        self
    }

    pub fn with_playout_host(mut self, host: impl Into<String>) -> Self {
        self.playout_host = host.into();
        self
    }

    /// Watchdog interval, never shorter than 100ms.
    pub fn disk_watch_interval(&self) -> Duration {
        Duration::from_secs(self.disk_watch_interval_secs).max(Duration::from_millis(100))
    }

    pub fn probe_stale_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_stale_timeout_secs)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("{key} must be a non-negative number, got '{value}': {e}")))
}
