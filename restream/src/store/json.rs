//! JSON file backed store.

use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{STORE_VERSION, Store, StoreData};
use crate::utils::fs::{create_parent_dir, read_optional};
use crate::{Error, Result};

/// Default file name of the snapshot.
pub const DEFAULT_FILENAME: &str = "db.json";

/// Stores the snapshot as a single JSON file.
///
/// Writes go to a temporary file next to the target which is then renamed
/// over it, so a crash never leaves a half-written snapshot behind.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store `db.json` in the given directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn target_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl Store for JsonStore {
    fn load(&self) -> Result<StoreData> {
        let Some(raw) = read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "No snapshot found, starting empty");
            return Ok(StoreData::new());
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreData::new());
        }

        let data: StoreData = serde_json::from_slice(&raw)?;

        if data.version != STORE_VERSION {
            return Err(Error::store(format!(
                "unsupported snapshot version {} in {} (expected {})",
                data.version,
                self.path.display(),
                STORE_VERSION
            )));
        }

        info!(
            path = %self.path.display(),
            processes = data.process.len(),
            "Loaded snapshot"
        );

        Ok(data)
    }

    fn store(&self, data: &StoreData) -> Result<()> {
        let _guard = self.write_lock.lock();

        create_parent_dir(&self.path)?;

        let payload = serde_json::to_vec_pretty(data)?;
        let dir = self.target_dir();

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| Error::io_path("creating temporary snapshot", dir, e))?;
        tmp.write_all(&payload)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::io_path("writing temporary snapshot", tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::io_path("replacing snapshot", &self.path, e.error))?;

        debug!(
            path = %self.path.display(),
            processes = data.process.len(),
            "Stored snapshot"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConfigIo, Order, Process, ProcessConfig};

    fn sample_process(id: &str) -> Process {
        let config = ProcessConfig::new(id)
            .with_autostart(true)
            .with_input(ConfigIo::new("in", "rtmp://localhost/live"))
            .with_output(ConfigIo::new("out", "-"));
        Process::new(config)
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());

        let data = store.load().unwrap();
        assert!(data.is_empty());
        assert_eq!(data.version, STORE_VERSION);
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested/db.json"));

        let mut data = StoreData::new();
        data.process.insert("p1".to_string(), sample_process("p1"));
        data.metadata
            .system
            .insert("owner".to_string(), serde_json::json!({"name": "ops"}));

        store.store(&data).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, data);
        assert_eq!(loaded.process["p1"].order, Order::Start);
    }

    #[test]
    fn test_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, r#"{"version": 1, "process": {}}"#).unwrap();

        let err = JsonStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
