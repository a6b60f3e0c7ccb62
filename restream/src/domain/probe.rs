//! Results of probing the inputs of a process.

use serde::{Deserialize, Serialize};

/// A stream detected in one of the inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeIo {
    pub address: String,
    pub index: usize,
    pub stream: usize,
    pub format: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub codec: String,
    pub coder: String,
    pub bitrate_kbps: f64,
    pub duration_secs: f64,
    pub language: String,

    // Video
    pub fps: f64,
    pub pix_fmt: String,
    pub width: u32,
    pub height: u32,

    // Audio
    pub sampling_hz: u32,
    pub layout: String,
    pub channels: u32,
}

/// Outcome of a probe run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub streams: Vec<ProbeIo>,
    pub log: Vec<String>,
}
