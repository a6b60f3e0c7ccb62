//! Process configuration as submitted by API clients.

use serde::{Deserialize, Serialize};

/// A cleanup rule attached to an output.
///
/// The pattern carries a filesystem tag (`diskfs:` or `memfs:`) followed by
/// a glob relative to that filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIoCleanup {
    pub pattern: String,
    #[serde(default)]
    pub max_files: u32,
    #[serde(default, rename = "max_file_age_seconds")]
    pub max_file_age_secs: u64,
    #[serde(default)]
    pub purge_on_delete: bool,
}

impl ConfigIoCleanup {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_max_files(mut self, max_files: u32) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_max_file_age_secs(mut self, secs: u64) -> Self {
        self.max_file_age_secs = secs;
        self
    }

    pub fn with_purge_on_delete(mut self, purge: bool) -> Self {
        self.purge_on_delete = purge;
        self
    }
}

/// An input or output endpoint of a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIo {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Only meaningful for outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<ConfigIoCleanup>,
}

impl ConfigIo {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            options: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cleanup(mut self, cleanup: ConfigIoCleanup) -> Self {
        self.cleanup.push(cleanup);
        self
    }
}

/// Resource limits enforced by the worker primitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigLimits {
    /// CPU usage in percent (0 = unlimited).
    #[serde(default)]
    pub cpu_usage: f64,
    /// Memory in bytes (0 = unlimited).
    #[serde(default)]
    pub memory_bytes: u64,
    /// Seconds a limit must be exceeded before the worker is killed.
    #[serde(default, rename = "waitfor_seconds")]
    pub waitfor_secs: u64,
}

/// Configuration of a single transcoder process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub id: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub input: Vec<ConfigIo>,
    #[serde(default)]
    pub output: Vec<ConfigIo>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub reconnect: bool,
    #[serde(default, rename = "reconnect_delay_seconds")]
    pub reconnect_delay_secs: u64,
    #[serde(default)]
    pub autostart: bool,
    #[serde(default, rename = "stale_timeout_seconds")]
    pub stale_timeout_secs: u64,
    #[serde(default)]
    pub limits: ConfigLimits,
}

impl ProcessConfig {
    /// Create a config with the given ID and no inputs or outputs.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_input(mut self, input: ConfigIo) -> Self {
        self.input.push(input);
        self
    }

    pub fn with_output(mut self, output: ConfigIo) -> Self {
        self.output.push(output);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool, delay_secs: u64) -> Self {
        self.reconnect = reconnect;
        self.reconnect_delay_secs = delay_secs;
        self
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn with_stale_timeout(mut self, secs: u64) -> Self {
        self.stale_timeout_secs = secs;
        self
    }

    pub fn with_limits(mut self, limits: ConfigLimits) -> Self {
        self.limits = limits;
        self
    }
}
