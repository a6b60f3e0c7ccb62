//! Runtime state of a registered process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Metadata, Process, ProcessConfig};
use crate::fs::CleanupPattern;
use crate::transcoder::{Parser, Worker, WorkerConfig};

const DISKFS_PREFIX: &str = "diskfs:";
const MEMFS_PREFIX: &str = "memfs:";

/// Everything derived from a config by a successful resolution.
pub(crate) struct Prepared {
    pub config: ProcessConfig,
    pub uses_disk: bool,
    pub playout: HashMap<String, u16>,
    pub command: Vec<String>,
    pub parser: Arc<dyn Parser>,
    pub worker: Box<dyn Worker>,
}

/// A registered process together with its resolved config and worker.
pub(crate) struct Task {
    pub process: Process,
    /// Resolved working copy of `process.config`.
    pub config: ProcessConfig,
    /// Whether resolution succeeded. Invalid tasks have no worker.
    pub valid: bool,
    pub command: Vec<String>,
    pub worker: Option<Box<dyn Worker>>,
    pub parser: Option<Arc<dyn Parser>>,
    /// Playout port per input ID.
    pub playout: HashMap<String, u16>,
    pub uses_disk: bool,
    pub metadata: Metadata,
}

impl Task {
    /// Wrap a record that hasn't been resolved yet.
    pub fn new(process: Process) -> Self {
        let config = process.config.clone();
        Self {
            process,
            config,
            valid: false,
            command: Vec::new(),
            worker: None,
            parser: None,
            playout: HashMap::new(),
            uses_disk: false,
            metadata: Metadata::new(),
        }
    }

    /// Install the result of a resolution and mark the task valid.
    ///
    /// The previous worker is dropped; the caller must have stopped it.
    pub fn apply(&mut self, prepared: Prepared) {
        self.config = prepared.config;
        self.uses_disk = prepared.uses_disk;
        self.playout = prepared.playout;
        self.command = prepared.command;
        self.parser = Some(prepared.parser);
        self.worker = Some(prepared.worker);
        self.valid = true;
    }

    /// Whether the worker was told to start.
    pub fn worker_started(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| worker.status().order.is_start())
    }
}

/// Build the worker config of a resolved process config.
pub(crate) fn worker_config(
    config: &ProcessConfig,
    command: Vec<String>,
    parser: Arc<dyn Parser>,
) -> WorkerConfig {
    WorkerConfig::new(command, parser)
        .with_reconnect(config.reconnect, Duration::from_secs(config.reconnect_delay_secs))
        .with_stale_timeout(Duration::from_secs(config.stale_timeout_secs))
        .with_limits(
            config.limits.cpu_usage,
            config.limits.memory_bytes,
            Duration::from_secs(config.limits.waitfor_secs),
        )
}

/// Cleanup rules of a config, split by the filesystem they target.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct CleanupRules {
    pub disk: Vec<CleanupPattern>,
    pub mem: Vec<CleanupPattern>,
}

/// Route the cleanup rules of all outputs to their filesystem.
///
/// Patterns without a known filesystem tag are ignored.
pub(crate) fn cleanup_rules(config: &ProcessConfig) -> CleanupRules {
    let mut rules = CleanupRules::default();

    for cleanup in config.output.iter().flat_map(|output| &output.cleanup) {
        let (target, pattern) = if let Some(pattern) = cleanup.pattern.strip_prefix(DISKFS_PREFIX) {
            (&mut rules.disk, pattern)
        } else if let Some(pattern) = cleanup.pattern.strip_prefix(MEMFS_PREFIX) {
            (&mut rules.mem, pattern)
        } else {
            continue;
        };

        target.push(CleanupPattern {
            pattern: pattern.to_string(),
            max_files: cleanup.max_files,
            max_file_age: Duration::from_secs(cleanup.max_file_age_secs),
            purge_on_delete: cleanup.purge_on_delete,
        });
    }

    rules
}
