//! The process orchestrator.
//!
//! [`Restreamer`] owns the registry of transcoder processes. It resolves
//! submitted configs into command lines, creates workers through the
//! injected [`Transcoder`], keeps track of the desired order of every
//! process and persists the registry after each change.
//!
//! All state lives behind one reader/writer lock. Fleet-wide
//! [`start`](Restreamer::start) and [`stop`](Restreamer::stop) additionally
//! serialize on an async mutex that owns the disk quota watchdog.

mod address;
mod command;
mod placeholder;
mod playout;
mod registry;
mod task;
mod watchdog;

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use self::registry::{Lifecycle, Registry, get_metadata_value, set_metadata_value};
use self::task::{Prepared, Task, cleanup_rules, worker_config};
use self::watchdog::DiskWatchdog;
use crate::config::RestreamConfig;
use crate::domain::{
    Metadata, Order, Probe, Process, ProcessConfig, ProcessInfo, ProcessLog, ProcessState,
};
use crate::fs::{Filesystem, NullFilesystem};
use crate::store::{MemoryStore, Store};
use crate::transcoder::{ExitCallback, Parser, Skills, Transcoder, WorkerConfig};
use crate::{Error, Result};

/// Builder for [`Restreamer`].
pub struct RestreamerBuilder {
    config: RestreamConfig,
    transcoder: Arc<dyn Transcoder>,
    store: Option<Arc<dyn Store>>,
    diskfs: Option<Arc<dyn Filesystem>>,
    memfs: Option<Arc<dyn Filesystem>>,
}

impl RestreamerBuilder {
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_disk_fs(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.diskfs = Some(fs);
        self
    }

    pub fn with_mem_fs(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.memfs = Some(fs);
        self
    }

    /// Load the persisted processes and build the orchestrator.
    ///
    /// Processes that fail to resolve are kept but marked invalid. Fails
    /// only if the store can't be read.
    pub fn build(self) -> Result<Restreamer> {
        let inner = Inner {
            registry: RwLock::new(Registry::new(self.config.max_processes)),
            created_at: Utc::now(),
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            transcoder: self.transcoder,
            diskfs: self
                .diskfs
                .unwrap_or_else(|| Arc::new(NullFilesystem::default())),
            memfs: self
                .memfs
                .unwrap_or_else(|| Arc::new(NullFilesystem::default())),
            config: self.config,
        };

        inner.load()?;
        inner.save(&inner.registry.read());

        info!(
            id = %inner.config.id,
            processes = inner.registry.read().tasks.len(),
            "Restreamer initialized"
        );

        Ok(Restreamer {
            inner: Arc::new(inner),
            watchdog: tokio::sync::Mutex::new(None),
        })
    }
}

struct Inner {
    config: RestreamConfig,
    created_at: DateTime<Utc>,
    store: Arc<dyn Store>,
    transcoder: Arc<dyn Transcoder>,
    diskfs: Arc<dyn Filesystem>,
    memfs: Arc<dyn Filesystem>,
    registry: RwLock<Registry>,
}

impl Inner {
    fn load(&self) -> Result<()> {
        let data = self.store.load()?;
        let mut registry = self.registry.write();

        let diskfs = self.diskfs.base();
        let memfs = self.memfs.base();

        for (id, mut process) in data.process {
            process.id = id.clone();
            let mut task = Task::new(process);
            placeholder::resolve_placeholders(&mut task.config, &diskfs, &memfs);
            registry.tasks.insert(id, task);
        }

        for (id, metadata) in data.metadata.process {
            if let Some(task) = registry.tasks.get_mut(&id) {
                task.metadata = metadata;
            }
        }
        registry.metadata = data.metadata.system;

        for id in registry.ids() {
            let Some(task) = registry.tasks.get(&id) else {
                continue;
            };
            let config = task.config.clone();
            let process = task.process.clone();

            match self.prepare(&process, config, |other| registry.resolved_config(other)) {
                Ok(prepared) => {
                    if let Some(task) = registry.tasks.get_mut(&id) {
                        task.apply(prepared);
                    }
                }
                Err(e) => warn!(process_id = %id, error = %e, "Ignoring invalid process"),
            }
        }

        Ok(())
    }

    /// Resolve a config that already had its placeholders expanded and
    /// create a worker for it.
    ///
    /// Nothing is registered; on failure all allocated ports are returned.
    fn prepare<'a, F>(&self, process: &Process, mut config: ProcessConfig, lookup: F) -> Result<Prepared>
    where
        F: Fn(&str) -> Option<&'a ProcessConfig>,
    {
        address::resolve_references(&mut config, lookup)?;

        let uses_disk =
            address::validate_config(&mut config, &self.diskfs.base(), self.transcoder.as_ref())?;

        let mut playout = playout::assign_ports(&mut config, self.transcoder.as_ref())?;
        let command = command::build_command(&config);
        let parser = self
            .transcoder
            .new_process_parser(&process.id, &process.reference);

        let worker = match self
            .transcoder
            .new_process(worker_config(&config, command.clone(), parser.clone()))
        {
            Ok(worker) => worker,
            Err(e) => {
                playout::release_ports(self.transcoder.as_ref(), &mut playout);
                return Err(e);
            }
        };

        Ok(Prepared {
            config,
            uses_disk,
            playout,
            command,
            parser,
            worker,
        })
    }

    /// Resolve a record from scratch against the current registry.
    fn prepare_fresh(&self, registry: &Registry, process: &Process) -> Result<Prepared> {
        let mut config = process.config.clone();
        placeholder::resolve_placeholders(&mut config, &self.diskfs.base(), &self.memfs.base());
        self.prepare(process, config, |other| registry.resolved_config(other))
    }

    fn release_ports(&self, task: &mut Task) {
        playout::release_ports(self.transcoder.as_ref(), &mut task.playout);
    }

    fn set_cleanup(&self, id: &str, config: &ProcessConfig) {
        let rules = cleanup_rules(config);
        if !rules.disk.is_empty() {
            self.diskfs.set_cleanup(id, rules.disk);
        }
        if !rules.mem.is_empty() {
            self.memfs.set_cleanup(id, rules.mem);
        }
    }

    fn unset_cleanup(&self, id: &str) {
        self.diskfs.unset_cleanup(id);
        self.memfs.unset_cleanup(id);
    }

    /// Persist the registry. Failures are logged and otherwise ignored.
    fn save(&self, registry: &Registry) {
        if let Err(e) = self.store.store(&registry.snapshot()) {
            error!(error = %e, "Failed to store snapshot");
        }
    }

    /// Stop all disk writing processes if the disk quota is exhausted.
    fn enforce_disk_quota(&self, token: Option<&CancellationToken>) -> Vec<String> {
        let (used, limit) = self.diskfs.size();
        if limit == 0 || used < limit {
            return Vec::new();
        }

        let mut registry = self.registry.write();

        // Stop() may have won the race for the lock.
        if token.is_some_and(CancellationToken::is_cancelled) {
            return Vec::new();
        }

        let ids: Vec<String> = registry
            .ids()
            .into_iter()
            .filter(|id| {
                registry.tasks.get(id).is_some_and(|task| {
                    task.valid && task.uses_disk && task.process.order.is_start()
                })
            })
            .collect();

        for id in &ids {
            warn!(process_id = %id, used, limit, "Disk quota exceeded, stopping process");
            if let Err(e) = registry.stop_task(id) {
                warn!(process_id = %id, error = %e, "Failed to stop process");
            }
        }

        ids
    }
}

/// Orchestrator of a fleet of transcoder processes.
pub struct Restreamer {
    inner: Arc<Inner>,
    watchdog: tokio::sync::Mutex<Option<DiskWatchdog>>,
}

impl Restreamer {
    pub fn builder(config: RestreamConfig, transcoder: Arc<dyn Transcoder>) -> RestreamerBuilder {
        RestreamerBuilder {
            config,
            transcoder,
            store: None,
            diskfs: None,
            memfs: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Whether the fleet is started.
    pub fn is_running(&self) -> bool {
        self.inner.registry.read().lifecycle == Lifecycle::Running
    }

    /// Number of processes currently ordered to run.
    pub fn running_processes(&self) -> u64 {
        self.inner.registry.read().running
    }

    /// Start every process whose order is "start", register cleanup rules,
    /// start the filesystems and the disk watchdog.
    ///
    /// A no-op if the fleet is already started.
    pub async fn start(&self) {
        let mut watchdog = self.watchdog.lock().await;

        {
            let mut registry = self.inner.registry.write();
            if registry.lifecycle == Lifecycle::Running {
                return;
            }

            for id in registry.ids() {
                let Some(task) = registry.tasks.get(&id) else {
                    continue;
                };
                self.inner.set_cleanup(&id, &task.config);

                if !task.process.order.is_start() {
                    continue;
                }
                if let Err(e) = registry.start_task(&id) {
                    warn!(process_id = %id, error = %e, "Failed to start process");
                }
            }

            self.inner.diskfs.start();
            self.inner.memfs.start();
            registry.lifecycle = Lifecycle::Running;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        *watchdog = Some(DiskWatchdog::spawn(
            self.inner.config.disk_watch_interval(),
            move |token| match weak.upgrade() {
                Some(inner) => {
                    inner.enforce_disk_quota(Some(token));
                    true
                }
                None => false,
            },
        ));

        info!(id = %self.inner.config.id, "Restreamer started");
    }

    /// Halt every worker without touching the desired orders, stop the
    /// disk watchdog and the filesystems.
    ///
    /// A no-op if the fleet is already stopped.
    pub async fn stop(&self) {
        let mut watchdog = self.watchdog.lock().await;

        {
            let mut registry = self.inner.registry.write();
            if registry.lifecycle == Lifecycle::Stopped {
                return;
            }

            registry.halt_all();
            for id in registry.tasks.keys() {
                self.inner.unset_cleanup(id);
            }
            registry.lifecycle = Lifecycle::Stopped;
        }

        if let Some(watchdog) = watchdog.take() {
            watchdog.shutdown().await;
        }

        self.inner.diskfs.stop();
        self.inner.memfs.stop();

        info!(id = %self.inner.config.id, "Restreamer stopped");
    }

    /// Run one disk quota check now. Returns the IDs of the stopped
    /// processes.
    pub fn enforce_disk_quota(&self) -> Vec<String> {
        self.inner.enforce_disk_quota(None)
    }

    /// Register a new process and start it if autostart is set.
    pub fn add_process(&self, mut config: ProcessConfig) -> Result<()> {
        config.id = config.id.trim().to_string();
        if config.id.is_empty() {
            return Err(Error::config("an empty ID is not allowed"));
        }

        let process = Process::new(config);
        let id = process.id.clone();

        let mut task = Task::new(process);
        let prepared = {
            let registry = self.inner.registry.read();
            self.inner.prepare_fresh(&registry, &task.process)?
        };
        task.apply(prepared);

        let mut registry = self.inner.registry.write();

        if registry.tasks.contains_key(&id) {
            self.inner.release_ports(&mut task);
            return Err(Error::conflict(format!("process '{id}' already exists")));
        }

        self.inner.set_cleanup(&id, &task.config);
        let autostart = task.process.order.is_start();
        registry.tasks.insert(id.clone(), task);

        if autostart && let Err(e) = registry.start_task(&id) {
            if let Some(mut task) = registry.tasks.remove(&id) {
                self.inner.release_ports(&mut task);
            }
            self.inner.unset_cleanup(&id);
            return Err(e);
        }

        info!(process_id = %id, autostart, "Added process");
        self.inner.save(&registry);
        Ok(())
    }

    /// Remove a process. Fails while its order is "start".
    pub fn delete_process(&self, id: &str) -> Result<()> {
        let mut registry = self.inner.registry.write();

        let task = registry.get(id)?;
        if task.process.order.is_start() {
            return Err(Error::conflict(format!(
                "process '{id}' is still running, stop it first"
            )));
        }

        if let Some(mut task) = registry.tasks.remove(id) {
            self.inner.release_ports(&mut task);
        }
        self.inner.unset_cleanup(id);

        info!(process_id = %id, "Deleted process");
        self.inner.save(&registry);
        Ok(())
    }

    pub fn start_process(&self, id: &str) -> Result<()> {
        let mut registry = self.inner.registry.write();
        registry.start_task(id)?;
        self.inner.save(&registry);
        Ok(())
    }

    pub fn stop_process(&self, id: &str) -> Result<()> {
        let mut registry = self.inner.registry.write();
        registry.stop_task(id)?;
        self.inner.save(&registry);
        Ok(())
    }

    /// Kill the worker of a process so it restarts. A no-op for processes
    /// whose order is "stop".
    pub fn restart_process(&self, id: &str) -> Result<()> {
        let registry = self.inner.registry.read();
        let task = registry.get(id)?;

        let Some(worker) = task.worker.as_ref().filter(|_| task.valid) else {
            return Err(Error::invalid_process(id));
        };

        if !task.process.order.is_start() {
            return Ok(());
        }

        worker.kill();
        info!(process_id = %id, "Restarted process");
        Ok(())
    }

    /// Resolve the submitted config of a process again and replace its
    /// worker.
    ///
    /// Playout ports are released before the new config is resolved. On
    /// failure a process without ports keeps its previous state, while one
    /// that held ports is stopped and marked invalid. A running process is
    /// stopped and started again with the new worker.
    pub fn reload_process(&self, id: &str) -> Result<()> {
        let mut registry = self.inner.registry.write();

        let process = registry.get(id)?.process.clone();

        // Ports go back to the pool first so the new config can reuse them.
        let task = registry.get_mut(id)?;
        let had_ports = !task.playout.is_empty();
        self.inner.release_ports(task);

        let prepared = match self.inner.prepare_fresh(&registry, &process) {
            Ok(prepared) => prepared,
            Err(e) => {
                // The running command still names the released ports.
                if had_ports {
                    registry.invalidate(id)?;
                }
                return Err(e);
            }
        };

        let was_started = process.order.is_start();
        if was_started {
            registry.stop_task(id)?;
        }

        let task = registry.get_mut(id)?;
        task.apply(prepared);
        let config = task.config.clone();

        self.inner.unset_cleanup(id);
        self.inner.set_cleanup(id, &config);

        let restarted = if was_started {
            registry.start_task(id)
        } else {
            Ok(())
        };

        info!(process_id = %id, restarted = was_started, "Reloaded process");
        self.inner.save(&registry);
        restarted
    }

    /// IDs of all registered processes, sorted.
    pub fn get_process_ids(&self) -> Vec<String> {
        self.inner.registry.read().ids()
    }

    pub fn get_process(&self, id: &str) -> Result<ProcessInfo> {
        let registry = self.inner.registry.read();
        let task = registry.get(id)?;

        Ok(ProcessInfo {
            process: task.process.clone(),
            resolved: task.valid.then(|| task.config.clone()),
            valid: task.valid,
        })
    }

    pub fn get_process_state(&self, id: &str) -> Result<ProcessState> {
        let registry = self.inner.registry.read();
        let task = registry.get(id)?;

        let (Some(worker), Some(parser)) = (task.worker.as_ref(), task.parser.as_ref()) else {
            return Err(Error::invalid_process(id));
        };

        let status = worker.status();

        let reconnect_secs = if task.process.order.is_start()
            && task.process.config.reconnect
            && !worker.is_running()
        {
            (task.process.config.reconnect_delay_secs as f64 - status.duration.as_secs_f64())
                .max(0.0)
        } else {
            -1.0
        };

        let mut progress = parser.progress();
        for (io, config) in progress.input.iter_mut().zip(&task.process.config.input) {
            io.id = config.id.clone();
        }
        for (io, config) in progress.output.iter_mut().zip(&task.process.config.output) {
            io.id = config.id.clone();
        }

        let last_log = parser
            .report()
            .log
            .last()
            .map(|line| line.data.clone())
            .unwrap_or_default();

        Ok(ProcessState {
            order: task.process.order,
            state: status.state,
            time: status.time,
            memory_bytes: status.memory,
            cpu_usage: status.cpu,
            duration_secs: status.duration.as_secs_f64(),
            reconnect_secs,
            command: task.command.clone(),
            progress,
            last_log,
        })
    }

    pub fn get_process_log(&self, id: &str) -> Result<ProcessLog> {
        let registry = self.inner.registry.read();
        let task = registry.get(id)?;

        let Some(parser) = task.parser.as_ref().filter(|_| task.valid) else {
            return Err(Error::invalid_process(id));
        };

        Ok(ProcessLog {
            current: parser.report(),
            history: parser.report_history(),
        })
    }

    /// Address under which the playout of an input is reachable.
    pub fn get_playout(&self, id: &str, input_id: &str) -> Result<String> {
        let registry = self.inner.registry.read();
        let task = registry.get(id)?;

        if !task.valid {
            return Err(Error::invalid_process(id));
        }

        let port = task
            .playout
            .get(input_id)
            .ok_or_else(|| Error::not_found("playout", format!("{id}:{input_id}")))?;

        Ok(format!("{}:{}", self.inner.config.playout_host, port))
    }

    /// Run the inputs of a process once and collect their stream
    /// information.
    ///
    /// Waits until the probe run exits. No lock is held meanwhile.
    pub async fn probe(&self, id: &str) -> Result<Probe> {
        let command = {
            let registry = self.inner.registry.read();
            let task = registry.get(id)?;
            if !task.valid {
                return Err(Error::invalid_process(id));
            }
            command::build_probe_command(&task.config)
        };

        let prober = self.inner.transcoder.new_probe_parser();
        let parser: Arc<dyn Parser> = prober.clone();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));
        let on_exit: ExitCallback = Arc::new(move || {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(());
            }
        });

        let config = WorkerConfig::new(command, parser)
            .with_stale_timeout(self.inner.config.probe_stale_timeout())
            .with_on_exit(on_exit);

        let worker = self.inner.transcoder.new_process(config)?;

        debug!(process_id = %id, "Probing process inputs");
        worker.start();
        let _ = rx.await;
        drop(worker);

        Ok(prober.probe())
    }

    pub fn skills(&self) -> Skills {
        self.inner.transcoder.skills()
    }

    pub fn reload_skills(&self) -> Result<()> {
        self.inner.transcoder.reload_skills()
    }

    /// Store a metadata value of a process. `null` deletes the key.
    pub fn set_process_metadata(&self, id: &str, key: &str, value: serde_json::Value) -> Result<()> {
        let mut registry = self.inner.registry.write();
        let task = registry.get_mut(id)?;
        set_metadata_value(&mut task.metadata, key, value)?;
        self.inner.save(&registry);
        Ok(())
    }

    /// Get a metadata value of a process. An empty key returns all of them.
    pub fn get_process_metadata(&self, id: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let registry = self.inner.registry.read();
        let task = registry.get(id)?;
        Ok(get_metadata_value(&task.metadata, key))
    }

    /// Store an instance-wide metadata value. `null` deletes the key.
    pub fn set_metadata(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut registry = self.inner.registry.write();
        set_metadata_value(&mut registry.metadata, key, value)?;
        self.inner.save(&registry);
        Ok(())
    }

    /// Get an instance-wide metadata value. An empty key returns all of
    /// them.
    pub fn get_metadata(&self, key: &str) -> Option<serde_json::Value> {
        get_metadata_value(&self.inner.registry.read().metadata, key)
    }

    /// Desired order of a process.
    pub fn get_process_order(&self, id: &str) -> Result<Order> {
        Ok(self.inner.registry.read().get(id)?.process.order)
    }

    /// All metadata of a process.
    pub fn process_metadata(&self, id: &str) -> Result<Metadata> {
        Ok(self.inner.registry.read().get(id)?.metadata.clone())
    }
}
