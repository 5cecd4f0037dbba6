use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::blob::BlobStore;
use crate::cache::CellCache;
use crate::config::StoreConfig;
use crate::error::DbError;
use crate::index::{IndexKey, IndexRange, IndexSet, RowSource};
use crate::journal::{CommittedRegistry, EventKind, EventRegistry, RegistryChain};
use crate::storage::{
    self, AreaStore, ByteReader, ByteWriter, TableHeader, HEADER_AREA,
};
use crate::types::{LobRef, Value};
use crate::{CommitId, RowNumber, TableId};

use super::changes::PendingChanges;
use super::collector::Collector;
use super::info::{IndexSetInfo, TableInfo};
use super::record;
use super::record_state::RecordState;
use super::slot_directory::SlotDirectory;

#[derive(Debug)]
struct SourceState {
    store: AreaStore,
    header: TableHeader,
    slots: SlotDirectory,
    journal: RegistryChain,
    collector: Collector,
    dirty: bool,
}

/// Reads cells straight from a locked state, bypassing the cache.
struct RecordReader<'a> {
    info: &'a TableInfo,
    state: &'a SourceState,
}

impl RecordReader<'_> {
    fn record(&self, row: RowNumber) -> Result<&[u8], DbError> {
        match self.state.slots.get(row) {
            Some(slot) if slot.state.is_live() => self.state.store.read(slot.pointer),
            _ => Err(DbError::RowNotFound {
                table: self.info.name.clone(),
                row,
            }),
        }
    }
}

impl RowSource for RecordReader<'_> {
    fn key_of(&self, row: RowNumber, columns: &[usize]) -> Result<IndexKey, DbError> {
        let record = self.record(row)?;
        let count = self.info.column_count();
        let values = columns
            .iter()
            .map(|&c| record::decode_cell(record, c, count))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IndexKey::new(values))
    }
}

/// One planned state transition of a commit or rollback.
struct Transition {
    row: RowNumber,
    kind: EventKind,
    to: RecordState,
}

/// Physical storage of one table.
///
/// Owns the slot directory, the record areas, the committed index set and
/// the table's registry chain. Every mutation of the slot directory and
/// the chain happens under the table's state lock; the committed index set
/// is published atomically so readers never block on writers.
#[derive(Debug)]
pub struct TableSource {
    table_id: TableId,
    info: TableInfo,
    index_info: IndexSetInfo,
    path: PathBuf,
    config: StoreConfig,
    state: Mutex<SourceState>,
    committed: ArcSwap<IndexSet>,
    root_locks: AtomicUsize,
    closed: AtomicBool,
    blobs: Arc<BlobStore>,
    cache: Option<Arc<dyn CellCache>>,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, DbError> {
    serde_json::to_vec(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, DbError> {
    serde_json::from_slice(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

fn encode_row_list(rows: &[RowNumber]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(8 + rows.len() * 8);
    w.put_i64(rows.len() as i64);
    for &row in rows {
        w.put_i64(row as i64);
    }
    w.into_inner()
}

fn decode_row_list(bytes: &[u8]) -> Result<Vec<RowNumber>, DbError> {
    let mut r = ByteReader::new(bytes);
    let count = r.i64()?;
    let count = usize::try_from(count)
        .ok()
        .filter(|&c| c.saturating_mul(8) <= r.remaining())
        .ok_or_else(|| DbError::DataCorruption(format!("bad committed row count {}", count)))?;
    (0..count)
        .map(|_| {
            let row = r.i64()?;
            usize::try_from(row)
                .map_err(|_| DbError::DataCorruption(format!("bad committed row {}", row)))
        })
        .collect()
}

impl TableSource {
    /// Creates the backing store for a new table.
    ///
    /// Fails with [`DbError::StorageInit`] if a store already exists at
    /// `path`.
    pub fn create(
        config: &StoreConfig,
        path: impl Into<PathBuf>,
        table_id: TableId,
        info: TableInfo,
        index_info: IndexSetInfo,
        blobs: Arc<BlobStore>,
        cache: Option<Arc<dyn CellCache>>,
    ) -> Result<Self, DbError> {
        let path = path.into();
        if storage::store_exists(&path) {
            return Err(DbError::StorageInit(format!(
                "backing store for table '{}' already exists at {}",
                info.name,
                path.display()
            )));
        }
        let indexes = index_info.create_index_set(&info)?;

        let slots = SlotDirectory::with_capacity(config.initial_slot_capacity);
        let mut store = AreaStore::new();
        let header = TableHeader {
            table_id,
            schema_area: store.allocate(to_json(&info)?),
            index_info_area: store.allocate(to_json(&index_info)?),
            index_store_area: store.allocate(encode_row_list(&[])),
            slot_dir_area: store.allocate(slots.encode()),
            ..TableHeader::default()
        };
        store.write(HEADER_AREA, header.encode())?;
        storage::write_store(&path, &store)?;

        tracing::info!(
            "Created table {} ({}) with {} columns and {} indexes",
            info.name,
            table_id,
            info.column_count(),
            indexes.index_count()
        );

        Ok(Self {
            table_id,
            info,
            index_info,
            path,
            config: config.clone(),
            state: Mutex::new(SourceState {
                store,
                header,
                slots,
                journal: RegistryChain::new(),
                collector: Collector::default(),
                dirty: false,
            }),
            committed: ArcSwap::from_pointee(indexes),
            root_locks: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            blobs,
            cache,
        })
    }

    /// Opens an existing table.
    ///
    /// Rows left uncommitted by a crash are marked removed and scavenged,
    /// as are committed-removed rows nothing can reach any more. Indexes
    /// are rebuilt from the persisted committed row list.
    pub fn open(
        config: &StoreConfig,
        path: impl Into<PathBuf>,
        blobs: Arc<BlobStore>,
        cache: Option<Arc<dyn CellCache>>,
    ) -> Result<Self, DbError> {
        let path = path.into();
        let store = storage::load_store(
            &path,
            config.persistence_max_retries,
            config.persistence_retry_delay_ms,
        )?;
        let header = TableHeader::decode(store.read(HEADER_AREA)?)?;
        let info: TableInfo = from_json(store.read(header.schema_area)?)?;
        let index_info: IndexSetInfo = from_json(store.read(header.index_info_area)?)?;
        let slots = SlotDirectory::decode(store.read(header.slot_dir_area)?)?;
        let committed_rows = decode_row_list(store.read(header.index_store_area)?)?;

        for &row in &committed_rows {
            let state = slots.get(row).map(|s| s.state);
            if state != Some(RecordState::CommittedAdded) {
                return Err(DbError::DataCorruption(format!(
                    "committed row {} of table '{}' is in state {:?}",
                    row, info.name, state
                )));
            }
        }
        let committed_added = slots
            .live_rows()
            .filter(|(_, s)| s.state == RecordState::CommittedAdded)
            .count();
        if committed_added != committed_rows.len() {
            return Err(DbError::DataCorruption(format!(
                "table '{}' lists {} committed rows but {} slots are committed",
                info.name,
                committed_rows.len(),
                committed_added
            )));
        }

        let mut journal = RegistryChain::new();
        journal.restore_watermark(header.last_commit_id);

        let source = Self {
            table_id: header.table_id,
            index_info,
            path,
            config: config.clone(),
            state: Mutex::new(SourceState {
                store,
                header,
                slots,
                journal,
                collector: Collector::default(),
                dirty: false,
            }),
            committed: ArcSwap::from_pointee(IndexSet::new(Vec::new())),
            root_locks: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            blobs,
            cache,
            info,
        };

        {
            let mut state = source.state.lock();
            let mut repaired = 0usize;
            let mut stale = Vec::new();
            for (row, slot) in state.slots.live_rows() {
                match slot.state {
                    RecordState::Uncommitted => {
                        repaired += 1;
                        stale.push(row);
                    }
                    RecordState::CommittedRemoved => stale.push(row),
                    _ => {}
                }
            }
            for &row in &stale {
                state.slots.set_state(row, RecordState::CommittedRemoved);
                source.hard_remove_locked(&mut state, row)?;
            }
            if repaired > 0 {
                tracing::warn!(
                    "Table {}: discarded {} uncommitted rows left by an unclean shutdown",
                    source.info.name,
                    repaired
                );
            }
            if !stale.is_empty() {
                state.dirty = true;
            }

            let mut indexes = source.index_info.create_index_set(&source.info)?;
            let reader = RecordReader {
                info: &source.info,
                state: &state,
            };
            indexes.rebuild(&reader, committed_rows)?;
            source.committed.store(Arc::new(indexes));
        }

        tracing::info!(
            "Opened table {} ({}) with {} committed rows",
            source.info.name,
            source.table_id,
            source.row_count()
        );
        Ok(source)
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    pub fn index_info(&self) -> &IndexSetInfo {
        &self.index_info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.is_closed() {
            return Err(DbError::TableClosed(self.info.name.clone()));
        }
        Ok(())
    }

    fn row_not_found(&self, row: RowNumber) -> DbError {
        DbError::RowNotFound {
            table: self.info.name.clone(),
            row,
        }
    }

    // ----- rows -----

    /// Stores a new row in the `Uncommitted` state and returns its number.
    ///
    /// The row is invisible to every snapshot until a commit naming it in
    /// an add event succeeds.
    pub fn add_row(&self, values: &[Value]) -> Result<RowNumber, DbError> {
        self.ensure_open()?;
        self.info.check_row(values)?;

        let lobs: Vec<LobRef> = values.iter().filter_map(Value::lob_ref).collect();
        for (i, lob) in lobs.iter().enumerate() {
            if let Err(e) = self.blobs.establish_reference(*lob) {
                for taken in &lobs[..i] {
                    self.blobs.release_reference(*taken)?;
                }
                return Err(e);
            }
        }

        let data = record::encode_record(values);
        let mut state = self.state.lock();
        let area = state.store.allocate(data);
        let row = match state.slots.allocate(area) {
            Ok(row) => row,
            Err(e) => {
                state.store.free(area)?;
                drop(state);
                for lob in &lobs {
                    self.blobs.release_reference(*lob)?;
                }
                return Err(e);
            }
        };
        state.dirty = true;

        tracing::debug!("Table {}: added uncommitted row {}", self.info.name, row);
        Ok(row)
    }

    /// Returns the state of a slot.
    pub fn read_state(&self, row: RowNumber) -> Result<RecordState, DbError> {
        self.state
            .lock()
            .slots
            .get(row)
            .map(|s| s.state)
            .ok_or_else(|| self.row_not_found(row))
    }

    /// Overwrites a slot's state and returns the state it held before.
    ///
    /// Callers compare the returned state with the one they expected and
    /// revert on mismatch; [`TableSource::transition`] does exactly that.
    /// Slots are moved to `Deleted` only by [`TableSource::hard_remove`].
    pub fn write_state(&self, row: RowNumber, state: RecordState) -> Result<RecordState, DbError> {
        self.ensure_open()?;
        if state == RecordState::Deleted {
            return Err(DbError::Argument(
                "slots are deleted through hard_remove".into(),
            ));
        }
        let mut guard = self.state.lock();
        match guard.slots.get(row) {
            Some(slot) if slot.state.is_live() => {}
            _ => return Err(self.row_not_found(row)),
        }
        let prior = guard
            .slots
            .set_state(row, state)
            .ok_or_else(|| self.row_not_found(row))?;
        guard.dirty = true;
        Ok(prior)
    }

    /// Moves a slot from `expected` to `to`, failing with a consistency
    /// error (and leaving the slot untouched) when it held anything else.
    pub fn transition(
        &self,
        row: RowNumber,
        expected: RecordState,
        to: RecordState,
    ) -> Result<(), DbError> {
        let prior = self.write_state(row, to)?;
        if prior != expected {
            self.write_state(row, prior)?;
            tracing::error!(
                "Table {}: row {} expected {:?} but found {:?}",
                self.info.name,
                row,
                expected,
                prior
            );
            return Err(DbError::Consistency {
                table_id: self.table_id,
                row,
                expected,
                found: prior,
            });
        }
        Ok(())
    }

    /// Reads one cell, consulting the cell cache first.
    pub fn get_cell(&self, column: usize, row: RowNumber) -> Result<Value, DbError> {
        self.ensure_open()?;
        let count = self.info.column_count();
        if column >= count {
            return Err(DbError::ColumnNotFound {
                table: self.info.name.clone(),
                column: format!("#{}", column),
            });
        }
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(self.table_id, row, column) {
                return Ok(value);
            }
        }

        let value = {
            let state = self.state.lock();
            let reader = RecordReader {
                info: &self.info,
                state: &state,
            };
            record::decode_cell(reader.record(row)?, column, count)?
        };

        if let Some(cache) = &self.cache {
            cache.put(self.table_id, row, column, value.clone());
        }
        Ok(value)
    }

    /// Reads a cell by column name.
    pub fn get_cell_by_name(&self, column: &str, row: RowNumber) -> Result<Value, DbError> {
        self.get_cell(self.info.column_index(column)?, row)
    }

    /// Reads every cell of a row.
    pub fn get_row(&self, row: RowNumber) -> Result<Vec<Value>, DbError> {
        (0..self.info.column_count())
            .map(|column| self.get_cell(column, row))
            .collect()
    }

    // ----- commit / rollback -----

    /// Checks every event of a registry against the slot states it expects,
    /// treating earlier events of the same registry as already applied.
    fn plan_transitions(
        &self,
        state: &SourceState,
        registry: &EventRegistry,
        commit: bool,
    ) -> Result<Vec<Transition>, DbError> {
        let mut overlay: HashMap<RowNumber, RecordState> = HashMap::new();
        let mut plan = Vec::with_capacity(registry.len());
        for event in registry.events() {
            let current = match overlay.get(&event.row) {
                Some(&s) => s,
                None => state
                    .slots
                    .get(event.row)
                    .map(|s| s.state)
                    .ok_or_else(|| self.row_not_found(event.row))?,
            };
            let (expected, to) = match (event.kind, commit) {
                (EventKind::Add, true) => {
                    (RecordState::Uncommitted, RecordState::CommittedAdded)
                }
                (EventKind::Remove, true) => {
                    (RecordState::CommittedAdded, RecordState::CommittedRemoved)
                }
                (EventKind::Add, false) => {
                    (RecordState::Uncommitted, RecordState::CommittedRemoved)
                }
                (EventKind::Remove, false) => continue,
            };
            if current != expected {
                tracing::error!(
                    "Table {}: {} of row {} expected {:?} but found {:?}",
                    self.info.name,
                    if commit { "commit" } else { "rollback" },
                    event.row,
                    expected,
                    current
                );
                return Err(DbError::Consistency {
                    table_id: self.table_id,
                    row: event.row,
                    expected,
                    found: current,
                });
            }
            overlay.insert(event.row, to);
            plan.push(Transition {
                row: event.row,
                kind: event.kind,
                to,
            });
        }
        Ok(plan)
    }

    /// Makes a transaction's changes to this table visible.
    ///
    /// Every add event moves its row `Uncommitted -> CommittedAdded` and
    /// every remove event `CommittedAdded -> CommittedRemoved`. The whole
    /// registry is validated before any slot changes, so a consistency
    /// error leaves the table exactly as it was.
    ///
    /// `indexes` is the transaction's own view and must agree with the
    /// registry on every row it names. The committed index set is not
    /// replaced by it: the registry's net effect is replayed onto the
    /// current committed set, so commits that landed after the
    /// transaction took its snapshot are kept. On success the registry
    /// joins the chain under `commit_id`.
    pub fn commit_change(
        &self,
        commit_id: CommitId,
        registry: EventRegistry,
        indexes: IndexSet,
    ) -> Result<(), DbError> {
        self.ensure_open()?;
        if registry.table_id() != self.table_id {
            return Err(DbError::Argument(format!(
                "registry for table {} committed against table {}",
                registry.table_id(),
                self.table_id
            )));
        }

        let mut state = self.state.lock();
        state.journal.check_next(commit_id)?;
        let plan = self.plan_transitions(&state, &registry, true)?;

        let finals: HashMap<RowNumber, RecordState> = plan.iter().map(|t| (t.row, t.to)).collect();
        for (&row, &to) in &finals {
            if indexes.contains(row) != (to == RecordState::CommittedAdded) {
                return Err(DbError::Argument(format!(
                    "index set disagrees with registry on row {} of table '{}'",
                    row, self.info.name
                )));
            }
        }
        let next = self.replay_onto_committed(&state, &finals)?;

        for t in &plan {
            state.slots.set_state(t.row, t.to);
            if t.kind == EventKind::Remove {
                state.collector.mark_removed(commit_id, t.row);
            }
        }
        if !registry.is_empty() {
            state
                .journal
                .append(Arc::new(registry.seal(commit_id)))?;
        }
        self.committed.store(Arc::new(next));
        state.header.last_commit_id = state.header.last_commit_id.max(commit_id);
        state.dirty = true;

        tracing::debug!(
            "Table {}: committed {} changes at commit {}",
            self.info.name,
            plan.len(),
            commit_id
        );

        if self.config.flush_on_commit {
            self.flush_locked(&mut state)?;
        }
        Ok(())
    }

    /// Applies the final state of each committed row to a copy of the
    /// current committed index set. Runs before any slot changes, while
    /// every row still has its record.
    fn replay_onto_committed(
        &self,
        state: &SourceState,
        finals: &HashMap<RowNumber, RecordState>,
    ) -> Result<IndexSet, DbError> {
        let mut next = IndexSet::clone(&self.committed.load());
        let reader = RecordReader {
            info: &self.info,
            state,
        };
        let mut rows: Vec<(RowNumber, RecordState)> =
            finals.iter().map(|(&row, &to)| (row, to)).collect();
        rows.sort_unstable_by_key(|&(row, _)| row);
        for (row, to) in rows {
            let visible = to == RecordState::CommittedAdded;
            match (visible, next.contains(row)) {
                (true, false) => next.insert_row(&reader, row)?,
                (false, true) => next.remove_row(&reader, row)?,
                _ => {}
            }
        }
        Ok(next)
    }

    /// Commits a set of pending changes.
    pub fn commit(&self, commit_id: CommitId, changes: PendingChanges) -> Result<(), DbError> {
        let (registry, indexes) = changes.into_parts();
        self.commit_change(commit_id, registry, indexes)
    }

    /// Discards a transaction's changes to this table.
    ///
    /// Every added row moves `Uncommitted -> CommittedRemoved` and becomes
    /// eligible for collection; remove events need no undo. Validation is
    /// all-or-nothing as in [`TableSource::commit_change`].
    pub fn rollback_change(&self, registry: EventRegistry) -> Result<(), DbError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let plan = self.plan_transitions(&state, &registry, false)?;
        for t in &plan {
            state.slots.set_state(t.row, t.to);
            state.collector.mark_eligible(t.row);
        }
        if !plan.is_empty() {
            state.dirty = true;
        }
        tracing::debug!(
            "Table {}: rolled back {} added rows",
            self.info.name,
            plan.len()
        );
        Ok(())
    }

    /// Rolls back a set of pending changes.
    pub fn rollback(&self, changes: PendingChanges) -> Result<(), DbError> {
        let (registry, _) = changes.into_parts();
        self.rollback_change(registry)
    }

    /// Drops every registry up to `commit_id` from the chain.
    ///
    /// Rows those commits removed become eligible for collection. Returns
    /// the number of registries merged.
    pub fn merge_changes(&self, commit_id: CommitId) -> Result<usize, DbError> {
        self.ensure_open()?;
        let merged = {
            let mut state = self.state.lock();
            let merged = state.journal.merge_up_to(commit_id);
            state.collector.release_merged(commit_id);
            merged.len()
        };
        if merged > 0 {
            tracing::debug!(
                "Table {}: merged {} registries up to commit {}",
                self.info.name,
                merged,
                commit_id
            );
        }
        if self.config.collect_on_merge {
            self.collect(false)?;
        }
        Ok(merged)
    }

    /// Every registry committed after `commit_id`, in commit order.
    pub fn find_changes_since(&self, commit_id: CommitId) -> Vec<Arc<CommittedRegistry>> {
        self.state.lock().journal.find_changes_since(commit_id)
    }

    pub fn last_commit_id(&self) -> Option<CommitId> {
        self.state.lock().journal.last_commit_id()
    }

    /// Highest commit id applied to this table, counting commits made
    /// before it was last opened.
    pub fn commit_watermark(&self) -> CommitId {
        let state = self.state.lock();
        state
            .header
            .last_commit_id
            .max(state.journal.last_commit_id().unwrap_or(0))
            .max(state.journal.merged_up_to())
    }

    pub(crate) fn restore_watermark(&self, last_commit_id: CommitId) {
        self.state.lock().journal.restore_watermark(last_commit_id);
    }

    // ----- reclamation -----

    fn hard_remove_locked(&self, state: &mut SourceState, row: RowNumber) -> Result<(), DbError> {
        let slot = state.slots.get(row).ok_or_else(|| self.row_not_found(row))?;
        if slot.state != RecordState::CommittedRemoved {
            return Err(DbError::Consistency {
                table_id: self.table_id,
                row,
                expected: RecordState::CommittedRemoved,
                found: slot.state,
            });
        }

        let count = self.info.column_count();
        if let Some(cache) = &self.cache {
            for column in 0..count {
                cache.invalidate(self.table_id, row, column);
            }
        }
        for lob in record::lob_refs(state.store.read(slot.pointer)?, count)? {
            self.blobs.release_reference(lob)?;
        }
        state.store.free(slot.pointer)?;
        state.slots.release(row)?;
        state.dirty = true;
        Ok(())
    }

    /// Reclaims a `CommittedRemoved` row, releasing its large objects and
    /// pushing its slot onto the delete chain.
    pub fn hard_remove(&self, row: RowNumber) -> Result<(), DbError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        self.hard_remove_locked(&mut state, row)?;
        state.collector.forget(row);
        tracing::debug!("Table {}: hard removed row {}", self.info.name, row);
        Ok(())
    }

    fn collect_inner(&self, force: bool) -> Result<usize, DbError> {
        let mut state = self.state.lock();
        let rows = if force {
            state.collector.take_all()
        } else {
            state.collector.take_eligible()
        };
        let mut reclaimed = 0;
        for row in rows {
            let removed = state
                .slots
                .get(row)
                .is_some_and(|s| s.state == RecordState::CommittedRemoved);
            if removed {
                self.hard_remove_locked(&mut state, row)?;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    /// Hard-removes rows no snapshot can reach any more.
    ///
    /// Skipped while root locks are held unless `force` is set; a forced
    /// pass also reclaims rows whose removing commit is not merged yet.
    pub fn collect(&self, force: bool) -> Result<usize, DbError> {
        self.ensure_open()?;
        if !force && self.has_root_locks() {
            return Ok(0);
        }
        let reclaimed = self.collect_inner(force)?;
        if reclaimed > 0 {
            tracing::debug!(
                "Table {}: collected {} rows",
                self.info.name,
                reclaimed
            );
        }
        Ok(reclaimed)
    }

    /// Rows waiting for collection.
    pub fn pending_collection(&self) -> usize {
        self.state.lock().collector.pending_count()
    }

    /// Slots currently on the delete chain.
    pub fn free_slot_count(&self) -> usize {
        self.state.lock().slots.free_count()
    }

    // ----- root locks -----

    /// Marks the table as in use by an outside reader.
    pub fn add_root_lock(&self) {
        self.root_locks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn remove_root_lock(&self) -> Result<(), DbError> {
        self.root_locks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| {
                DbError::Argument(format!(
                    "table '{}' holds no root locks",
                    self.info.name
                ))
            })
    }

    pub fn has_root_locks(&self) -> bool {
        self.root_locks.load(Ordering::Acquire) > 0
    }

    pub fn root_lock_count(&self) -> usize {
        self.root_locks.load(Ordering::Acquire)
    }

    // ----- sequence -----

    /// Returns the current sequence value and advances it.
    pub fn next_sequence_id(&self) -> Result<i64, DbError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let id = state.header.sequence_id;
        state.header.sequence_id += 1;
        state.dirty = true;
        Ok(id)
    }

    pub fn set_sequence_id(&self, value: i64) -> Result<(), DbError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        state.header.sequence_id = value;
        state.dirty = true;
        Ok(())
    }

    // ----- committed view -----

    /// The committed index set current at the time of the call.
    pub fn committed_indexes(&self) -> Arc<IndexSet> {
        self.committed.load_full()
    }

    /// Committed rows, ascending.
    pub fn committed_rows(&self) -> Vec<RowNumber> {
        self.committed.load().rows().to_vec()
    }

    /// Number of committed rows.
    pub fn row_count(&self) -> usize {
        self.committed.load().row_count()
    }

    /// Starts a change set against the current committed snapshot.
    pub fn begin_changes(&self) -> PendingChanges {
        PendingChanges::new(self.table_id, IndexSet::clone(&self.committed.load()))
    }

    /// Selects committed rows through a named index.
    pub fn select_range(
        &self,
        index: &str,
        ranges: &[IndexRange],
    ) -> Result<Vec<RowNumber>, DbError> {
        let snapshot = self.committed.load();
        let index = snapshot
            .index_named(index)
            .ok_or_else(|| DbError::IndexNotFound {
                table: self.info.name.clone(),
                index: index.to_string(),
            })?;
        index.select_range(self, ranges)
    }

    /// Selects committed rows whose `index` key equals `key`.
    pub fn select_equal(&self, index: &str, key: impl Into<IndexKey>) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(index, &[IndexRange::equal(key.into())])
    }

    // ----- persistence -----

    /// Writes the table image. Large objects its records refer to are
    /// made durable first.
    fn flush_locked(&self, state: &mut SourceState) -> Result<(), DbError> {
        self.blobs.flush()?;
        let slots = state.slots.encode();
        let rows = encode_row_list(self.committed.load().rows());
        let header = state.header;
        state.store.write(header.slot_dir_area, slots)?;
        state.store.write(header.index_store_area, rows)?;
        state.store.write(HEADER_AREA, header.encode())?;
        storage::write_store(&self.path, &state.store)?;
        state.dirty = false;
        Ok(())
    }

    /// Writes the table's backing store if anything changed.
    pub fn flush(&self) -> Result<(), DbError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if state.dirty {
            self.flush_locked(&mut state)?;
            tracing::debug!("Table {}: flushed", self.info.name);
        }
        Ok(())
    }

    /// Closes the table.
    ///
    /// Pending rows are collected first. With `drop_pending` the backing
    /// store is deleted and every large object the remaining rows refer to
    /// is released; otherwise the store is flushed. Fails with
    /// [`DbError::TableInUse`] while root locks are held.
    pub fn close(&self, drop_pending: bool) -> Result<(), DbError> {
        let locks = self.root_lock_count();
        if locks > 0 {
            return Err(DbError::TableInUse {
                table: self.info.name.clone(),
                locks,
            });
        }
        if self.is_closed() {
            return Ok(());
        }

        self.collect_inner(true)?;
        {
            let mut state = self.state.lock();
            if drop_pending {
                let count = self.info.column_count();
                let live: Vec<i64> = state.slots.live_rows().map(|(_, s)| s.pointer).collect();
                for area in live {
                    for lob in record::lob_refs(state.store.read(area)?, count)? {
                        self.blobs.release_reference(lob)?;
                    }
                }
                storage::delete_store(&self.path)?;
            } else {
                self.flush_locked(&mut state)?;
            }
        }
        self.closed.store(true, Ordering::Release);

        tracing::info!(
            "Closed table {} ({}){}",
            self.info.name,
            self.table_id,
            if drop_pending { " and dropped its store" } else { "" }
        );
        Ok(())
    }
}

impl RowSource for TableSource {
    fn key_of(&self, row: RowNumber, columns: &[usize]) -> Result<IndexKey, DbError> {
        let values = columns
            .iter()
            .map(|&c| self.get_cell(c, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IndexKey::new(values))
    }
}
