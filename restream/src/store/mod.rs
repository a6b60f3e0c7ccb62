//! Persistence of process records and metadata.
//!
//! The orchestrator writes a full snapshot after every mutating operation
//! and reads it once at construction.

pub mod json;
pub mod memory;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::domain::{Metadata, Process};

pub use json::JsonStore;
pub use memory::MemoryStore;

/// Current version of the snapshot format.
pub const STORE_VERSION: u32 = 4;

/// Metadata section of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Instance-wide metadata.
    #[serde(default)]
    pub system: Metadata,
    /// Metadata per process ID.
    #[serde(default)]
    pub process: HashMap<String, Metadata>,
}

/// A full snapshot of the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    pub version: u32,
    #[serde(default)]
    pub process: HashMap<String, Process>,
    #[serde(default)]
    pub metadata: StoreMetadata,
}

impl StoreData {
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            process: HashMap::new(),
            metadata: StoreMetadata::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.process.is_empty() && self.metadata.system.is_empty()
    }
}

impl Default for StoreData {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable storage for snapshots.
pub trait Store: Send + Sync {
    /// Load the last snapshot. An empty store yields an empty snapshot.
    fn load(&self) -> Result<StoreData>;

    /// Replace the stored snapshot.
    fn store(&self, data: &StoreData) -> Result<()>;
}
