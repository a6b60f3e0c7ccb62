//! Worker primitive traits and related types.
//!
//! The orchestrator never spawns transcoder processes itself. It builds a
//! [`WorkerConfig`] and hands it to a [`Transcoder`], which returns a
//! [`Worker`] handle that owns the external process, its reconnect policy
//! and its stale-timeout supervision.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::port::PortError;
use super::skills::Skills;
use crate::Result;
use crate::domain::{ExecState, Order, Probe, Progress, Report};

/// Callback invoked once when a worker's process exits for good.
pub type ExitCallback = Arc<dyn Fn() + Send + Sync>;

/// Configuration for a new worker.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Restart the process after it exited.
    pub reconnect: bool,
    /// Delay before a restart.
    pub reconnect_delay: Duration,
    /// Kill the process if it doesn't make progress for this long
    /// (zero = never).
    pub stale_timeout: Duration,
    /// CPU limit in percent (0 = unlimited).
    pub limit_cpu: f64,
    /// Memory limit in bytes (0 = unlimited).
    pub limit_memory: u64,
    /// How long a limit must be exceeded before the process is killed.
    pub limit_duration: Duration,
    /// Arguments passed to the transcoder binary.
    pub command: Vec<String>,
    /// Parser fed with the process output.
    pub parser: Arc<dyn Parser>,
    pub on_exit: Option<ExitCallback>,
}

impl WorkerConfig {
    /// Create a config for a one-shot run of `command`.
    pub fn new(command: Vec<String>, parser: Arc<dyn Parser>) -> Self {
        Self {
            reconnect: false,
            reconnect_delay: Duration::ZERO,
            stale_timeout: Duration::ZERO,
            limit_cpu: 0.0,
            limit_memory: 0,
            limit_duration: Duration::ZERO,
            command,
            parser,
            on_exit: None,
        }
    }

    pub fn with_reconnect(mut self, reconnect: bool, delay: Duration) -> Self {
        self.reconnect = reconnect;
        self.reconnect_delay = delay;
        self
    }

    pub fn with_stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout = timeout;
        self
    }

    pub fn with_limits(mut self, cpu: f64, memory: u64, duration: Duration) -> Self {
        self.limit_cpu = cpu;
        self.limit_memory = memory;
        self.limit_duration = duration;
        self
    }

    pub fn with_on_exit(mut self, callback: ExitCallback) -> Self {
        self.on_exit = Some(callback);
        self
    }
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("reconnect", &self.reconnect)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("stale_timeout", &self.stale_timeout)
            .field("limit_cpu", &self.limit_cpu)
            .field("limit_memory", &self.limit_memory)
            .field("limit_duration", &self.limit_duration)
            .field("command", &self.command)
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

/// Status reported by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// The order the worker itself is following.
    pub order: Order,
    pub state: ExecState,
    /// Time of the last state change.
    pub time: DateTime<Utc>,
    pub memory: u64,
    pub cpu: f64,
    /// Time spent in the current state.
    pub duration: Duration,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            order: Order::Stop,
            state: ExecState::Finished,
            time: Utc::now(),
            memory: 0,
            cpu: 0.0,
            duration: Duration::ZERO,
        }
    }
}

/// Handle to one supervised transcoder process.
///
/// Implementations must not block: `start`, `stop` and `kill` only signal
/// the supervision loop. They are called while the registry lock is held.
pub trait Worker: Send + Sync {
    /// Start the process and keep it running according to the reconnect
    /// policy.
    fn start(&self);

    /// Stop the process and don't restart it.
    fn stop(&self);

    /// Kill the process. It is restarted if reconnect is enabled.
    fn kill(&self);

    fn status(&self) -> Status;

    fn is_running(&self) -> bool;
}

/// Parses the output of a running process.
pub trait Parser: Send + Sync {
    fn progress(&self) -> Progress;

    /// Log of the current (or last) run.
    fn report(&self) -> Report;

    /// Logs of previous runs, oldest first.
    fn report_history(&self) -> Vec<Report>;
}

/// Parser that collects the stream information of the inputs.
pub trait ProbeParser: Parser {
    fn probe(&self) -> Probe;
}

/// Factory and gatekeeper for transcoder processes.
pub trait Transcoder: Send + Sync {
    fn new_process(&self, config: WorkerConfig) -> Result<Box<dyn Worker>>;

    fn new_process_parser(&self, id: &str, reference: &str) -> Arc<dyn Parser>;

    fn new_probe_parser(&self) -> Arc<dyn ProbeParser>;

    /// Take a port from the shared pool.
    fn get_port(&self) -> std::result::Result<u16, PortError>;

    /// Return a port to the shared pool.
    fn put_port(&self, port: u16);

    fn validate_input_address(&self, address: &str) -> bool;

    fn validate_output_address(&self, address: &str) -> bool;

    fn skills(&self) -> Skills;

    fn reload_skills(&self) -> Result<()>;
}
