//! Runtime state, progress and logs reported for a process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::process::Order;

/// Execution state as reported by the worker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecState {
    #[default]
    Finished,
    Starting,
    Running,
    Finishing,
    Killed,
    Failed,
}

impl ExecState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Finishing => "finishing",
            Self::Killed => "killed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of one input or output stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressIo {
    /// ID of the input/output in the submitted config. Filled in by the
    /// orchestrator from `index`.
    #[serde(default)]
    pub id: String,
    pub address: String,
    /// Position of the input/output in the config.
    pub index: usize,
    /// Stream index within the input/output.
    pub stream: usize,
    pub format: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub codec: String,
    pub frame: u64,
    pub fps: f64,
    pub packet: u64,
    pub size_kb: u64,
    pub bitrate_kbit: f64,
}

/// Progress of a running process as accumulated by its parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub input: Vec<ProgressIo>,
    pub output: Vec<ProgressIo>,
    pub frame: u64,
    pub packet: u64,
    pub fps: f64,
    pub quantizer: f64,
    pub size_kb: u64,
    pub time_secs: f64,
    pub bitrate_kbit: f64,
    pub speed: f64,
    pub drop: u64,
    pub dup: u64,
}

/// A single captured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub data: String,
}

/// The log of one run of a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub created_at: DateTime<Utc>,
    pub prelude: Vec<String>,
    pub log: Vec<LogLine>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            prelude: Vec::new(),
            log: Vec::new(),
        }
    }
}

/// Current and past logs of a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLog {
    pub current: Report,
    pub history: Vec<Report>,
}

/// Snapshot of the state of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub order: Order,
    pub state: ExecState,
    /// Time of the last state change.
    pub time: DateTime<Utc>,
    pub memory_bytes: u64,
    pub cpu_usage: f64,
    pub duration_secs: f64,
    /// Seconds until the next reconnect, `-1` if none is pending.
    pub reconnect_secs: f64,
    pub command: Vec<String>,
    pub progress: Progress,
    pub last_log: String,
}
