//! Domain layer for restream.
//!
//! Process configurations, persisted records and the runtime views that the
//! orchestrator hands out.

pub mod config;
pub mod probe;
pub mod process;
pub mod state;

pub use config::{ConfigIo, ConfigIoCleanup, ConfigLimits, ProcessConfig};
pub use probe::{Probe, ProbeIo};
pub use process::{Metadata, Order, Process, ProcessInfo};
pub use state::{ExecState, LogLine, ProcessLog, ProcessState, Progress, ProgressIo, Report};
