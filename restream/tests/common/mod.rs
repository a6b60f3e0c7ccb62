//! Hand-written collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use restream::domain::{
    ConfigIo, LogLine, Probe, ProbeIo, ProcessConfig, Progress, ProgressIo, Report,
};
use restream::fs::{CleanupPattern, Filesystem};
use restream::store::MemoryStore;
use restream::transcoder::{
    AddressPolicy, ExitCallback, Parser, PortError, PortRange, ProbeParser, Skills, Status,
    Transcoder, Worker, WorkerConfig,
};
use restream::{Error, Restreamer, RestreamConfig, Result};

/// Observable state of one mock worker.
#[derive(Default)]
pub struct WorkerRecord {
    pub command: Vec<String>,
    pub reconnect: bool,
    pub status: Mutex<Status>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub kills: AtomicUsize,
    pub on_exit: Option<ExitCallback>,
}

impl WorkerRecord {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

pub struct MockWorker {
    record: Arc<WorkerRecord>,
}

impl Worker for MockWorker {
    fn start(&self) {
        self.record.starts.fetch_add(1, Ordering::SeqCst);
        {
            let mut status = self.record.status.lock();
            status.order = restream::domain::Order::Start;
            status.state = restream::domain::ExecState::Running;
        }

        // One-shot runs exit right away.
        if let Some(on_exit) = &self.record.on_exit {
            on_exit();
        }
    }

    fn stop(&self) {
        self.record.stops.fetch_add(1, Ordering::SeqCst);
        let mut status = self.record.status.lock();
        status.order = restream::domain::Order::Stop;
        status.state = restream::domain::ExecState::Finished;
    }

    fn kill(&self) {
        self.record.kills.fetch_add(1, Ordering::SeqCst);
    }

    fn status(&self) -> Status {
        self.record.status.lock().clone()
    }

    fn is_running(&self) -> bool {
        self.record.status.lock().state == restream::domain::ExecState::Running
    }
}

pub struct MockParser {
    pub progress: Progress,
    pub report: Report,
}

impl Parser for MockParser {
    fn progress(&self) -> Progress {
        self.progress.clone()
    }

    fn report(&self) -> Report {
        self.report.clone()
    }

    fn report_history(&self) -> Vec<Report> {
        vec![Report::default()]
    }
}

pub struct MockProbeParser {
    pub probe: Probe,
}

impl Parser for MockProbeParser {
    fn progress(&self) -> Progress {
        Progress::default()
    }

    fn report(&self) -> Report {
        Report::default()
    }

    fn report_history(&self) -> Vec<Report> {
        Vec::new()
    }
}

impl ProbeParser for MockProbeParser {
    fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

/// Transcoder that records every worker it creates.
pub struct MockTranscoder {
    pub ports: PortRange,
    pub policy: AddressPolicy,
    pub workers: Mutex<Vec<Arc<WorkerRecord>>>,
    pub fail_new_process: AtomicBool,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self::with_ports(PortRange::none())
    }

    pub fn with_ports(ports: PortRange) -> Self {
        Self {
            ports,
            policy: AddressPolicy::allow_all(),
            workers: Mutex::new(Vec::new()),
            fail_new_process: AtomicBool::new(false),
        }
    }

    pub fn with_policy(mut self, policy: AddressPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The most recently created worker.
    pub fn last_worker(&self) -> Arc<WorkerRecord> {
        self.workers
            .lock()
            .last()
            .cloned()
            .expect("no worker created")
    }

    /// The most recently created worker running the given argument.
    pub fn worker_with_arg(&self, arg: &str) -> Arc<WorkerRecord> {
        self.workers
            .lock()
            .iter()
            .rev()
            .find(|record| record.command.iter().any(|a| a == arg))
            .cloned()
            .expect("no worker with argument")
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }
}

impl Transcoder for MockTranscoder {
    fn new_process(&self, config: WorkerConfig) -> Result<Box<dyn Worker>> {
        if self.fail_new_process.load(Ordering::SeqCst) {
            return Err(Error::Worker("spawning disabled".to_string()));
        }

        let record = Arc::new(WorkerRecord {
            command: config.command.clone(),
            reconnect: config.reconnect,
            on_exit: config.on_exit.clone(),
            ..Default::default()
        });
        self.workers.lock().push(record.clone());

        Ok(Box::new(MockWorker { record }))
    }

    fn new_process_parser(&self, _id: &str, _reference: &str) -> Arc<dyn Parser> {
        let progress = Progress {
            input: vec![ProgressIo::default()],
            output: vec![ProgressIo::default(), ProgressIo::default()],
            ..Default::default()
        };
        let report = Report {
            log: vec![
                LogLine {
                    timestamp: chrono::Utc::now(),
                    data: "first".to_string(),
                },
                LogLine {
                    timestamp: chrono::Utc::now(),
                    data: "last".to_string(),
                },
            ],
            ..Default::default()
        };
        Arc::new(MockParser { progress, report })
    }

    fn new_probe_parser(&self) -> Arc<dyn ProbeParser> {
        Arc::new(MockProbeParser {
            probe: Probe {
                streams: vec![ProbeIo {
                    address: "rtmp://localhost/live".to_string(),
                    codec: "h264".to_string(),
                    media_type: "video".to_string(),
                    width: 1280,
                    height: 720,
                    ..Default::default()
                }],
                log: vec!["probe done".to_string()],
            },
        })
    }

    fn get_port(&self) -> std::result::Result<u16, PortError> {
        self.ports.get()
    }

    fn put_port(&self, port: u16) {
        self.ports.put(port);
    }

    fn validate_input_address(&self, address: &str) -> bool {
        self.policy.is_input_allowed(address)
    }

    fn validate_output_address(&self, address: &str) -> bool {
        self.policy.is_output_allowed(address)
    }

    fn skills(&self) -> Skills {
        Skills::default()
    }

    fn reload_skills(&self) -> Result<()> {
        Ok(())
    }
}

/// Filesystem with a settable usage and recorded cleanup rules.
pub struct MockFilesystem {
    base: String,
    pub used: AtomicU64,
    pub limit: AtomicU64,
    pub started: AtomicBool,
    pub cleanup: Mutex<HashMap<String, Vec<CleanupPattern>>>,
}

impl MockFilesystem {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            used: AtomicU64::new(0),
            limit: AtomicU64::new(0),
            started: AtomicBool::new(false),
            cleanup: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_usage(&self, used: u64, limit: u64) {
        self.used.store(used, Ordering::SeqCst);
        self.limit.store(limit, Ordering::SeqCst);
    }

    pub fn rules(&self, id: &str) -> Vec<CleanupPattern> {
        self.cleanup.lock().get(id).cloned().unwrap_or_default()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Filesystem for MockFilesystem {
    fn base(&self) -> String {
        self.base.clone()
    }

    fn size(&self) -> (u64, u64) {
        (
            self.used.load(Ordering::SeqCst),
            self.limit.load(Ordering::SeqCst),
        )
    }

    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn set_cleanup(&self, id: &str, patterns: Vec<CleanupPattern>) {
        self.cleanup.lock().insert(id.to_string(), patterns);
    }

    fn unset_cleanup(&self, id: &str) {
        self.cleanup.lock().remove(id);
    }
}

/// Everything a test needs to drive and observe a restreamer.
pub struct Harness {
    pub restreamer: Restreamer,
    pub transcoder: Arc<MockTranscoder>,
    pub store: Arc<MemoryStore>,
    pub diskfs: Arc<MockFilesystem>,
    pub memfs: Arc<MockFilesystem>,
}

pub const DISK_BASE: &str = "/var/media";
pub const MEM_BASE: &str = "http://127.0.0.1:8080/memfs";

impl Harness {
    pub fn new() -> Self {
        Self::build(RestreamConfig::new(), MockTranscoder::new(), MemoryStore::new())
    }

    pub fn with_config(config: RestreamConfig) -> Self {
        Self::build(config, MockTranscoder::new(), MemoryStore::new())
    }

    pub fn build(config: RestreamConfig, transcoder: MockTranscoder, store: MemoryStore) -> Self {
        let transcoder = Arc::new(transcoder);
        let store = Arc::new(store);
        let diskfs = Arc::new(MockFilesystem::new(DISK_BASE));
        let memfs = Arc::new(MockFilesystem::new(MEM_BASE));

        let restreamer = Restreamer::builder(config, transcoder.clone())
            .with_store(store.clone())
            .with_disk_fs(diskfs.clone())
            .with_mem_fs(memfs.clone())
            .build()
            .expect("Failed to build restreamer");

        Self {
            restreamer,
            transcoder,
            store,
            diskfs,
            memfs,
        }
    }
}

/// A process reading from RTMP and writing to stdout.
pub fn simple_process(id: &str) -> ProcessConfig {
    ProcessConfig::new(id)
        .with_input(ConfigIo::new("in", "rtmp://localhost/live/{processid}"))
        .with_output(ConfigIo::new("out", "-"))
}

/// A process writing into the disk filesystem.
pub fn disk_process(id: &str) -> ProcessConfig {
    ProcessConfig::new(id)
        .with_input(ConfigIo::new("in", "rtmp://localhost/live/{processid}"))
        .with_output(ConfigIo::new("out", "{diskfs}/{processid}/{outputid}.mp4"))
}
