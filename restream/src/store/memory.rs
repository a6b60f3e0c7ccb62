//! In-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{Store, StoreData};
use crate::Result;

/// Keeps the last snapshot in memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with a snapshot.
    pub fn with_data(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
            writes: AtomicUsize::new(0),
        }
    }

    /// The last stored snapshot.
    pub fn snapshot(&self) -> StoreData {
        self.data.lock().clone()
    }

    /// Number of snapshots written so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<StoreData> {
        Ok(self.data.lock().clone())
    }

    fn store(&self, data: &StoreData) -> Result<()> {
        *self.data.lock() = data.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
