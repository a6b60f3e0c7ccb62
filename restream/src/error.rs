//! Application-wide error types.

use std::path::Path;

use thiserror::Error;

use crate::transcoder::PortError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Reference error for '#{process_id}:{input_id}': {reason}")]
    Reference {
        process_id: String,
        input_id: String,
        reason: String,
    },

    #[error("Max. number of running processes ({max}) reached")]
    Capacity { max: u64 },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid process definition: {0}")]
    InvalidProcess(String),

    #[error("Port allocation failed: {0}")]
    Port(#[from] PortError),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error while {op} '{path}': {source}")]
    IoPath {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn unknown_process(id: impl Into<String>) -> Self {
        Self::not_found("process", id)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn reference(
        process_id: impl Into<String>,
        input_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Reference {
            process_id: process_id.into(),
            input_id: input_id.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_process(id: impl Into<String>) -> Self {
        Self::InvalidProcess(id.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether the error stems from the submitted configuration rather than
    /// from the runtime state of the fleet.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Reference { .. })
    }
}
