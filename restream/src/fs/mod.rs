//! Filesystems the transcoder processes write to.
//!
//! The orchestrator only needs a base path for placeholder substitution, the
//! current usage for the disk quota watchdog, and a place to register
//! cleanup rules for the files a process produces.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

/// A cleanup rule registered with a filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPattern {
    /// Glob relative to the filesystem root.
    pub pattern: String,
    /// Keep at most this many matching files (0 = unlimited).
    pub max_files: u32,
    /// Remove matching files older than this (zero = keep forever).
    pub max_file_age: Duration,
    /// Remove all matching files when the rule is unregistered.
    pub purge_on_delete: bool,
}

/// A filesystem owned by the orchestrator.
pub trait Filesystem: Send + Sync {
    /// Root directory of the filesystem.
    fn base(&self) -> String;

    /// Current usage and limit in bytes. A limit of 0 means unlimited.
    fn size(&self) -> (u64, u64);

    /// Start enforcing cleanup rules.
    fn start(&self);

    fn stop(&self);

    /// Replace the cleanup rules of a process.
    fn set_cleanup(&self, id: &str, patterns: Vec<CleanupPattern>);

    fn unset_cleanup(&self, id: &str);
}

/// Filesystem that stores nothing. Used when no filesystem is configured.
///
/// The default instance has an empty base, so nothing resolves into it.
#[derive(Debug)]
pub struct NullFilesystem {
    base: String,
    cleanup: Mutex<HashMap<String, Vec<CleanupPattern>>>,
}

impl NullFilesystem {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            cleanup: Mutex::new(HashMap::new()),
        }
    }

    /// Cleanup rules currently registered for a process.
    pub fn cleanup_rules(&self, id: &str) -> Vec<CleanupPattern> {
        self.cleanup.lock().get(id).cloned().unwrap_or_default()
    }
}

impl Default for NullFilesystem {
    fn default() -> Self {
        Self::new("")
    }
}

impl Filesystem for NullFilesystem {
    fn base(&self) -> String {
        self.base.clone()
    }

    fn size(&self) -> (u64, u64) {
        (0, 0)
    }

    fn start(&self) {}

    fn stop(&self) {}

    fn set_cleanup(&self, id: &str, patterns: Vec<CleanupPattern>) {
        self.cleanup.lock().insert(id.to_string(), patterns);
    }

    fn unset_cleanup(&self, id: &str) {
        self.cleanup.lock().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_filesystem_tracks_rules() {
        let fs = NullFilesystem::default();
        assert!(fs.base().is_empty());
        assert_eq!(fs.size(), (0, 0));

        let rule = CleanupPattern {
            pattern: "/p1/*.ts".to_string(),
            max_files: 10,
            max_file_age: Duration::ZERO,
            purge_on_delete: true,
        };
        fs.set_cleanup("p1", vec![rule.clone()]);
        assert_eq!(fs.cleanup_rules("p1"), vec![rule]);

        fs.unset_cleanup("p1");
        assert!(fs.cleanup_rules("p1").is_empty());
    }
}
