//! The set of registered tasks and the running-process counter.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::task::Task;
use crate::domain::{Metadata, Order, ProcessConfig};
use crate::store::StoreData;
use crate::{Error, Result};

/// Whether the fleet as a whole is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Lifecycle {
    #[default]
    Stopped,
    Running,
}

/// State guarded by the orchestrator's lock.
///
/// `running` counts the workers that were told to start. It is raised when
/// a worker is started and lowered when it is stopped, independent of
/// whether the process actually reached the running state.
#[derive(Default)]
pub(crate) struct Registry {
    pub tasks: HashMap<String, Task>,
    pub running: u64,
    pub max_processes: u64,
    pub lifecycle: Lifecycle,
    pub metadata: Metadata,
}

impl Registry {
    pub fn new(max_processes: u64) -> Self {
        Self {
            max_processes,
            ..Default::default()
        }
    }

    pub fn get(&self, id: &str) -> Result<&Task> {
        self.tasks.get(id).ok_or_else(|| Error::unknown_process(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.tasks.get_mut(id).ok_or_else(|| Error::unknown_process(id))
    }

    /// Resolved config of a task, used to resolve references.
    pub fn resolved_config(&self, id: &str) -> Option<&ProcessConfig> {
        self.tasks.get(id).map(|task| &task.config)
    }

    /// Registered IDs in sorted order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Order a task to start.
    ///
    /// A no-op if both the task and its worker already follow a start
    /// order. Fails on invalid tasks and when the process limit is reached.
    pub fn start_task(&mut self, id: &str) -> Result<()> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| Error::unknown_process(id))?;

        let Some(worker) = task.worker.as_ref().filter(|_| task.valid) else {
            return Err(Error::invalid_process(id));
        };

        let worker_started = worker.status().order.is_start();
        if task.process.order.is_start() && worker_started {
            return Ok(());
        }

        if !worker_started && self.max_processes > 0 && self.running >= self.max_processes {
            return Err(Error::Capacity {
                max: self.max_processes,
            });
        }

        task.process.order = Order::Start;
        worker.start();

        if !worker_started {
            self.running += 1;
        }

        info!(process_id = %id, running = self.running, "Started process");
        Ok(())
    }

    /// Order a task to stop. Invalid tasks only get their order flipped.
    pub fn stop_task(&mut self, id: &str) -> Result<()> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| Error::unknown_process(id))?;

        let worker_started = task.worker_started();
        if !task.process.order.is_start() && !worker_started {
            return Ok(());
        }

        task.process.order = Order::Stop;

        if let Some(worker) = &task.worker {
            worker.stop();
        }

        if worker_started {
            self.running = self.running.saturating_sub(1);
        }

        info!(process_id = %id, running = self.running, "Stopped process");
        Ok(())
    }

    /// Stop all workers without changing the persisted orders.
    pub fn halt_all(&mut self) {
        for (id, task) in &self.tasks {
            if !task.worker_started() {
                continue;
            }

            if let Some(worker) = &task.worker {
                worker.stop();
            }
            self.running = self.running.saturating_sub(1);
            debug!(process_id = %id, "Halted process");
        }
    }

    /// Stop and drop the worker of a task and mark it invalid.
    ///
    /// The persisted order is kept, so a later successful reload resumes it.
    pub fn invalidate(&mut self, id: &str) -> Result<()> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| Error::unknown_process(id))?;

        if task.worker_started() {
            self.running = self.running.saturating_sub(1);
        }
        if let Some(worker) = task.worker.take() {
            worker.stop();
        }

        task.parser = None;
        task.command.clear();
        task.uses_disk = false;
        task.valid = false;

        warn!(process_id = %id, running = self.running, "Invalidated process");
        Ok(())
    }

    /// Snapshot of the persisted part of the registry.
    pub fn snapshot(&self) -> StoreData {
        let mut data = StoreData::new();

        for (id, task) in &self.tasks {
            data.process.insert(id.clone(), task.process.clone());
            if !task.metadata.is_empty() {
                data.metadata
                    .process
                    .insert(id.clone(), task.metadata.clone());
            }
        }

        data.metadata.system = self.metadata.clone();
        data
    }
}

/// Insert or remove a metadata entry. `null` removes the key.
pub(crate) fn set_metadata_value(
    metadata: &mut Metadata,
    key: &str,
    value: serde_json::Value,
) -> Result<()> {
    if key.is_empty() {
        return Err(Error::config("a key for storing the data has to be provided"));
    }

    if value.is_null() {
        metadata.remove(key);
    } else {
        metadata.insert(key.to_string(), value);
    }

    Ok(())
}

/// Look up a metadata entry. An empty key returns the whole map, or `None`
/// if there is nothing stored.
pub(crate) fn get_metadata_value(metadata: &Metadata, key: &str) -> Option<serde_json::Value> {
    if key.is_empty() {
        if metadata.is_empty() {
            return None;
        }
        let map: serde_json::Map<String, serde_json::Value> = metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        return Some(serde_json::Value::Object(map));
    }

    metadata.get(key).cloned()
}
