//! Storage configuration.

use std::path::PathBuf;

/// Storage core configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the catalog and every table's backing store
    pub data_dir: PathBuf,
    /// Initial slot directory capacity in rows
    pub initial_slot_capacity: usize,
    /// Persist the table's backing store after every commit
    pub flush_on_commit: bool,
    /// Run a collection pass after merging changes
    pub collect_on_merge: bool,
    /// Maximum time to wait for a table lock in milliseconds (0 = forever)
    pub lock_wait_timeout_ms: u64,
    /// Maximum retry attempts for transient I/O errors while loading
    pub persistence_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub persistence_retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            initial_slot_capacity: 1024,
            flush_on_commit: true,
            collect_on_merge: true,
            lock_wait_timeout_ms: 0,
            persistence_max_retries: 3,
            persistence_retry_delay_ms: 100,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration rooted at the given data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Returns the lock wait bound, or `None` to wait forever.
    pub fn lock_wait_timeout(&self) -> Option<std::time::Duration> {
        (self.lock_wait_timeout_ms > 0)
            .then(|| std::time::Duration::from_millis(self.lock_wait_timeout_ms))
    }
}
