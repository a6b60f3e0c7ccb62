//! Persisted process record and desired order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::ProcessConfig;

/// Free-form metadata attached to a process or to the whole instance.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Desired order of a process. Independent of the actual execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Start,
    #[default]
    Stop,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The persisted record of a process: the config as submitted plus the
/// desired order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: String,
    #[serde(default)]
    pub reference: String,
    pub config: ProcessConfig,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub order: Order,
}

impl Process {
    /// Create a record for a freshly submitted config. The order follows
    /// the autostart flag.
    pub fn new(config: ProcessConfig) -> Self {
        let order = if config.autostart {
            Order::Start
        } else {
            Order::Stop
        };

        Self {
            id: config.id.clone(),
            reference: config.reference.clone(),
            config,
            created_at: Utc::now(),
            order,
        }
    }
}

/// Query view of a registered process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInfo {
    /// The persisted record, config as submitted.
    pub process: Process,
    /// The resolved working copy. `None` while the process is invalid.
    pub resolved: Option<ProcessConfig>,
    pub valid: bool,
}
