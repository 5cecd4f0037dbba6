//! Table system: every table of one database, its catalog and the shared
//! collaborators (blob store, locking mechanism, cell cache).

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::blob::BlobStore;
use crate::cache::CellCache;
use crate::config::StoreConfig;
use crate::error::DbError;
use crate::lock::LockingMechanism;
use crate::storage::io_utils::{classify_io_error, retry_io_operation};
use crate::table::{IndexSetInfo, TableInfo, TableSource};
use crate::{CommitId, TableId};

const CATALOG_FILE: &str = "catalog.json";
const BLOB_FILE: &str = "blobs.store";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    id: TableId,
    name: String,
    file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Catalog {
    next_table_id: TableId,
    last_commit_id: CommitId,
    tables: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            next_table_id: 1,
            last_commit_id: 0,
            tables: Vec::new(),
        }
    }
}

/// Owns every [`TableSource`] of one database.
///
/// Allocates table ids and commit ids, keeps the catalog on disk, and
/// closes dropped tables once nothing holds a root lock on them.
#[derive(Debug)]
pub struct TableSystem {
    config: StoreConfig,
    /// Map of table name to open table
    tables: RwLock<HashMap<String, Arc<TableSource>>>,
    /// Dropped tables still waiting for their root locks to go
    dropped: Mutex<Vec<Arc<TableSource>>>,
    next_table_id: AtomicU32,
    last_commit_id: AtomicU64,
    blobs: Arc<BlobStore>,
    locking: Arc<LockingMechanism>,
    cache: Option<Arc<dyn CellCache>>,
    closed: AtomicBool,
}

impl TableSystem {
    /// Opens the database in `config.data_dir`, creating it if needed.
    pub fn open(config: StoreConfig) -> Result<Self, DbError> {
        Self::open_with_cache(config, None)
    }

    /// Opens the database with a cell cache shared by every table.
    pub fn open_with_cache(
        config: StoreConfig,
        cache: Option<Arc<dyn CellCache>>,
    ) -> Result<Self, DbError> {
        fs::create_dir_all(&config.data_dir)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;

        let blobs = Arc::new(BlobStore::open(
            &config.data_dir.join(BLOB_FILE),
            config.persistence_max_retries,
            config.persistence_retry_delay_ms,
        )?);
        let catalog = Self::load_catalog(&config)?;

        let mut tables = HashMap::with_capacity(catalog.tables.len());
        for entry in &catalog.tables {
            let table = TableSource::open(
                &config,
                config.data_dir.join(&entry.file),
                Arc::clone(&blobs),
                cache.clone(),
            )?;
            if table.table_id() != entry.id || table.name() != entry.name {
                return Err(DbError::DataCorruption(format!(
                    "catalog lists table '{}' ({}) but {} holds '{}' ({})",
                    entry.name,
                    entry.id,
                    entry.file,
                    table.name(),
                    table.table_id()
                )));
            }
            tables.insert(entry.name.clone(), Arc::new(table));
        }

        // Table headers are written with every commit, the catalog is not.
        let last_commit_id = tables
            .values()
            .map(|t| t.commit_watermark())
            .fold(catalog.last_commit_id, CommitId::max);
        if last_commit_id > catalog.last_commit_id {
            tracing::warn!(
                "Catalog commit id {} is behind the tables, resuming from {}",
                catalog.last_commit_id,
                last_commit_id
            );
        }
        for table in tables.values() {
            table.restore_watermark(last_commit_id);
        }

        tracing::info!(
            "Opened database at {} with {} tables",
            config.data_dir.display(),
            tables.len()
        );

        let system = Self {
            locking: Arc::new(LockingMechanism::new(config.lock_wait_timeout())),
            tables: RwLock::new(tables),
            dropped: Mutex::new(Vec::new()),
            next_table_id: AtomicU32::new(catalog.next_table_id),
            last_commit_id: AtomicU64::new(last_commit_id),
            blobs,
            cache,
            closed: AtomicBool::new(false),
            config,
        };
        system.save_catalog()?;
        Ok(system)
    }

    fn catalog_path(config: &StoreConfig) -> PathBuf {
        config.data_dir.join(CATALOG_FILE)
    }

    fn load_catalog(config: &StoreConfig) -> Result<Catalog, DbError> {
        let path = Self::catalog_path(config);
        if !path.exists() {
            return Ok(Catalog::default());
        }
        let raw = retry_io_operation(
            || fs::read(&path),
            config.persistence_max_retries,
            config.persistence_retry_delay_ms,
            "Failed to read catalog",
        )?;
        serde_json::from_slice(&raw).map_err(|e| DbError::Serialization(e.to_string()))
    }

    fn save_catalog(&self) -> Result<(), DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        let mut entries: Vec<CatalogEntry> = tables
            .values()
            .map(|t| CatalogEntry {
                id: t.table_id(),
                name: t.name().to_string(),
                file: table_file(t.table_id()),
            })
            .collect();
        drop(tables);
        entries.sort_by_key(|e| e.id);

        let catalog = Catalog {
            next_table_id: self.next_table_id.load(Ordering::Acquire),
            last_commit_id: self.last_commit_id.load(Ordering::Acquire),
            tables: entries,
        };
        let json = serde_json::to_string_pretty(&catalog)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let final_path = Self::catalog_path(&self.config);
        let temp_path = final_path.with_extension("json.tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| classify_io_error(e, "Failed to create catalog temp file"))?;
        file.write_all(json.as_bytes())
            .map_err(|e| classify_io_error(e, "Failed to write catalog"))?;
        file.sync_all()
            .map_err(|e| classify_io_error(e, "Failed to sync catalog"))?;
        fs::rename(&temp_path, &final_path)
            .map_err(|e| classify_io_error(e, "Failed to rename catalog"))?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::Argument("table system is closed".into()));
        }
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// The locking mechanism shared by every operation on this database.
    pub fn locking(&self) -> &Arc<LockingMechanism> {
        &self.locking
    }

    pub fn blobs(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    /// Creates a table and its backing store.
    pub fn create_table(
        &self,
        info: TableInfo,
        index_info: IndexSetInfo,
    ) -> Result<Arc<TableSource>, DbError> {
        self.ensure_open()?;
        let table = {
            let mut tables = self.tables.write().map_err(|_| DbError::LockPoisoned)?;
            if tables.contains_key(&info.name) {
                return Err(DbError::TableAlreadyExists(info.name));
            }
            let id = self.next_table_id.fetch_add(1, Ordering::AcqRel);
            let table = Arc::new(TableSource::create(
                &self.config,
                self.config.data_dir.join(table_file(id)),
                id,
                info,
                index_info,
                Arc::clone(&self.blobs),
                self.cache.clone(),
            )?);
            tables.insert(table.name().to_string(), Arc::clone(&table));
            table
        };
        self.save_catalog()?;
        Ok(table)
    }

    /// Looks a table up by name.
    pub fn table(&self, name: &str) -> Result<Arc<TableSource>, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_by_id(&self, id: TableId) -> Result<Arc<TableSource>, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        tables
            .values()
            .find(|t| t.table_id() == id)
            .cloned()
            .ok_or(DbError::TableIdNotFound(id))
    }

    pub fn contains_table(&self, name: &str) -> Result<bool, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        Ok(tables.contains_key(name))
    }

    /// Table names, sorted.
    pub fn table_names(&self) -> Result<Vec<String>, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn table_count(&self) -> Result<usize, DbError> {
        let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
        Ok(tables.len())
    }

    /// Removes a table from the database.
    ///
    /// The table disappears from lookups immediately. Its backing store is
    /// deleted once no root lock holds it, possibly right away.
    pub fn drop_table(&self, name: &str) -> Result<(), DbError> {
        self.ensure_open()?;
        let table = {
            let mut tables = self.tables.write().map_err(|_| DbError::LockPoisoned)?;
            tables
                .remove(name)
                .ok_or_else(|| DbError::TableNotFound(name.to_string()))?
        };
        tracing::info!("Dropping table {} ({})", name, table.table_id());
        self.dropped.lock().push(table);
        self.save_catalog()?;
        self.collect_dropped()?;
        Ok(())
    }

    /// Dropped tables still waiting to be closed.
    pub fn pending_drops(&self) -> usize {
        self.dropped.lock().len()
    }

    /// Closes and deletes every dropped table nothing holds any more.
    pub fn collect_dropped(&self) -> Result<usize, DbError> {
        let ready: Vec<Arc<TableSource>> = {
            let mut dropped = self.dropped.lock();
            let (ready, waiting) = dropped.drain(..).partition(|t| !t.has_root_locks());
            *dropped = waiting;
            ready
        };

        let mut closed = 0;
        let mut failed = Vec::new();
        let mut first_error = None;
        for table in ready {
            match table.close(true) {
                Ok(()) => closed += 1,
                Err(e) => {
                    tracing::error!("Failed to close dropped table {}: {}", table.name(), e);
                    first_error.get_or_insert(e);
                    failed.push(table);
                }
            }
        }
        self.dropped.lock().extend(failed);

        if closed > 0 {
            tracing::debug!("Collected {} dropped tables", closed);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }

    /// Allocates the next commit id.
    pub fn next_commit_id(&self) -> CommitId {
        self.last_commit_id.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn last_commit_id(&self) -> CommitId {
        self.last_commit_id.load(Ordering::Acquire)
    }

    /// Merges every table's registries up to `commit_id`, then collects
    /// dropped tables. Returns the number of registries merged.
    pub fn merge_changes(&self, commit_id: CommitId) -> Result<usize, DbError> {
        let tables: Vec<Arc<TableSource>> = {
            let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
            tables.values().cloned().collect()
        };
        let mut merged = 0;
        for table in tables {
            merged += table.merge_changes(commit_id)?;
        }
        self.collect_dropped()?;
        Ok(merged)
    }

    /// Flushes every table, the blob store and the catalog.
    pub fn flush_all(&self) -> Result<(), DbError> {
        let tables: Vec<Arc<TableSource>> = {
            let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
            tables.values().cloned().collect()
        };
        tracing::debug!("Flushing all {} tables", tables.len());

        let mut first_error = None;
        for table in &tables {
            if let Err(e) = table.flush() {
                tracing::error!("Failed to flush table {}: {}", table.name(), e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        self.blobs.flush()?;
        self.save_catalog()
    }

    /// Closes every table and persists the database.
    ///
    /// Fails with [`DbError::TableInUse`] if a table still holds root
    /// locks; tables closed before the failure stay closed.
    pub fn close(&self) -> Result<(), DbError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        let tables: Vec<Arc<TableSource>> = {
            let tables = self.tables.read().map_err(|_| DbError::LockPoisoned)?;
            tables.values().cloned().collect()
        };
        for table in &tables {
            table.close(false)?;
        }
        self.collect_dropped()?;
        self.blobs.flush()?;
        self.save_catalog()?;
        self.closed.store(true, Ordering::Release);

        tracing::info!(
            "Closed database at {} ({} tables, {} drops pending)",
            self.config.data_dir.display(),
            tables.len(),
            self.pending_drops()
        );
        Ok(())
    }
}

fn table_file(id: TableId) -> String {
    format!("table_{:06}.store", id)
}
