//! Capabilities of the transcoder binary.

use serde::{Deserialize, Serialize};

/// Version and build information of the transcoder binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryInfo {
    pub version: String,
    pub compiler: String,
    pub configuration: String,
}

/// What the installed transcoder binary is able to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skills {
    pub binary: BinaryInfo,
    pub filters: Vec<String>,
    pub hwaccels: Vec<String>,
    pub codecs: Vec<String>,
    pub formats: Vec<String>,
    pub protocols: Vec<String>,
    pub devices: Vec<String>,
}
