//! Pool of local ports handed out to playout inputs.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors returned by a port pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// No port range has been configured; playout is unavailable.
    #[error("no port range provided")]
    NoPortRange,

    #[error("no more ports available in range {min}-{max}")]
    Exhausted { min: u16, max: u16 },

    #[error("invalid port range {min}-{max}")]
    InvalidRange { min: u16, max: u16 },
}

/// A thread-safe pool over an inclusive port range.
#[derive(Debug)]
pub struct PortRange {
    range: Option<(u16, u16)>,
    used: Mutex<BTreeSet<u16>>,
}

impl PortRange {
    /// Create a pool over `min..=max`.
    pub fn new(min: u16, max: u16) -> Result<Self, PortError> {
        if min == 0 || min > max {
            return Err(PortError::InvalidRange { min, max });
        }

        Ok(Self {
            range: Some((min, max)),
            used: Mutex::new(BTreeSet::new()),
        })
    }

    /// A pool without a range. Every request fails with
    /// [`PortError::NoPortRange`].
    pub fn none() -> Self {
        Self {
            range: None,
            used: Mutex::new(BTreeSet::new()),
        }
    }

    /// Take the lowest free port.
    pub fn get(&self) -> Result<u16, PortError> {
        let (min, max) = self.range.ok_or(PortError::NoPortRange)?;
        let mut used = self.used.lock();

        let port = (min..=max)
            .find(|port| !used.contains(port))
            .ok_or(PortError::Exhausted { min, max })?;

        used.insert(port);
        debug!(port, "Port taken from pool");

        Ok(port)
    }

    /// Return a port. Ports outside the range or not taken are ignored.
    pub fn put(&self, port: u16) {
        if self.used.lock().remove(&port) {
            debug!(port, "Port returned to pool");
        }
    }

    /// Number of ports currently handed out.
    pub fn in_use(&self) -> usize {
        self.used.lock().len()
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::none()
    }
}
