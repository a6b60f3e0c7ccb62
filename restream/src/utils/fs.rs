//! Synchronous file helpers used by the snapshot store and log setup.
//!
//! Errors carry the failed operation and the path it was applied to.

use std::io::ErrorKind;
use std::path::Path;

use crate::{Error, Result};

/// Create `path` and any missing ancestors. `op` names the step in errors.
pub fn create_dir_all(op: &'static str, path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path(op, path, e))
}

/// Create the directory a file will be written into.
///
/// A bare file name refers to the working directory and needs nothing.
pub fn create_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            create_dir_all("creating parent directory", parent)
        }
        _ => Ok(()),
    }
}

/// Contents of a file, or `None` when there is no such file.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io_path("reading file", path, e)),
    }
}
