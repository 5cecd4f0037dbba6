//! Reference-counted store for out-of-line large objects.
//!
//! Cells of large-object columns hold a [`LobRef`] into this store. Adding a
//! row establishes a reference for each such cell; hard-removing the row
//! releases it, and the object is freed once nothing refers to it. Objects
//! that were allocated but never referenced are purged when the store is
//! reopened.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::DbError;
use crate::storage::{self, AreaStore, ByteReader, ByteWriter};
use crate::types::{LobKind, LobRef};

#[derive(Debug)]
struct BlobState {
    store: AreaStore,
    dirty: bool,
}

/// Large-object store shared by every table of a database.
#[derive(Debug)]
pub struct BlobStore {
    path: Option<PathBuf>,
    state: Mutex<BlobState>,
}

fn encode_blob(ref_count: i64, kind: LobKind, data: &[u8]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(data.len() + 12);
    w.put_i64(ref_count).put_i32(kind.code()).put_bytes(data);
    w.into_inner()
}

fn decode_blob(area: &[u8]) -> Result<(i64, LobKind, &[u8]), DbError> {
    let mut r = ByteReader::new(area);
    let ref_count = r.i64()?;
    let code = r.i32()?;
    let kind = LobKind::from_code(code)
        .ok_or_else(|| DbError::DataCorruption(format!("unknown large object kind {}", code)))?;
    let data = r.bytes(r.remaining())?;
    Ok((ref_count, kind, data))
}

impl BlobStore {
    /// Creates a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(BlobState {
                store: AreaStore::new(),
                dirty: false,
            }),
        }
    }

    /// Opens the store persisted at `path`, or starts an empty one.
    ///
    /// No caller can still hold an unreferenced object from a previous
    /// run, so those are purged on the way in.
    pub fn open(path: &Path, max_retries: u32, retry_delay_ms: u64) -> Result<Self, DbError> {
        let store = if storage::store_exists(path) {
            storage::load_store(path, max_retries, retry_delay_ms)?
        } else {
            AreaStore::new()
        };
        let blobs = Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(BlobState {
                store,
                dirty: false,
            }),
        };
        let purged = blobs.purge_unreferenced()?;
        if purged > 0 {
            tracing::warn!(
                "Purged {} unreferenced large objects from {}",
                purged,
                path.display()
            );
        }
        Ok(blobs)
    }

    /// Stores a new large object with no references.
    pub fn allocate(&self, kind: LobKind, data: &[u8]) -> LobRef {
        let mut state = self.state.lock();
        let id = state.store.allocate(encode_blob(0, kind, data));
        state.dirty = true;
        LobRef { kind, id }
    }

    /// Returns a copy of the object's bytes.
    pub fn read(&self, lob: LobRef) -> Result<Vec<u8>, DbError> {
        let state = self.state.lock();
        let (_, _, data) = decode_blob(state.store.read(lob.id)?)?;
        Ok(data.to_vec())
    }

    /// Returns the current reference count of an object.
    pub fn reference_count(&self, lob: LobRef) -> Result<i64, DbError> {
        let state = self.state.lock();
        let (count, _, _) = decode_blob(state.store.read(lob.id)?)?;
        Ok(count)
    }

    fn adjust(&self, lob: LobRef, delta: i64) -> Result<i64, DbError> {
        let mut state = self.state.lock();
        let (count, kind, data) = {
            let (count, kind, data) = decode_blob(state.store.read(lob.id)?)?;
            (count, kind, data.to_vec())
        };
        if kind != lob.kind {
            return Err(DbError::Argument(format!(
                "large object {} is {:?}, not {:?}",
                lob.id, kind, lob.kind
            )));
        }
        let count = count + delta;
        if count < 0 {
            return Err(DbError::DataCorruption(format!(
                "large object {} released more often than referenced",
                lob.id
            )));
        }
        if count == 0 {
            state.store.free(lob.id)?;
            tracing::debug!("Freed large object {}", lob.id);
        } else {
            let updated = encode_blob(count, kind, &data);
            state.store.write(lob.id, updated)?;
        }
        state.dirty = true;
        Ok(count)
    }

    /// Records one more cell referring to the object.
    pub fn establish_reference(&self, lob: LobRef) -> Result<(), DbError> {
        self.adjust(lob, 1).map(|_| ())
    }

    /// Drops one reference, freeing the object when none remain.
    pub fn release_reference(&self, lob: LobRef) -> Result<(), DbError> {
        self.adjust(lob, -1).map(|_| ())
    }

    /// Frees every object with no references and returns how many went.
    ///
    /// Only safe while no caller holds a freshly allocated object it has
    /// not referenced yet.
    pub fn purge_unreferenced(&self) -> Result<usize, DbError> {
        let mut state = self.state.lock();
        let mut unreferenced = Vec::new();
        for id in state.store.area_ids() {
            let (count, _, _) = decode_blob(state.store.read(id)?)?;
            if count == 0 {
                unreferenced.push(id);
            }
        }
        for &id in &unreferenced {
            state.store.free(id)?;
        }
        if !unreferenced.is_empty() {
            state.dirty = true;
        }
        Ok(unreferenced.len())
    }

    /// Number of large objects currently stored.
    pub fn object_count(&self) -> usize {
        self.state.lock().store.live_area_count() - 1
    }

    /// Persists the store if it has a backing file and changed since the last flush.
    pub fn flush(&self) -> Result<(), DbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut state = self.state.lock();
        if state.dirty {
            storage::write_store(path, &state.store)?;
            state.dirty = false;
        }
        Ok(())
    }
}
