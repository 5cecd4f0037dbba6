use std::sync::Arc;

use crate::error::DbError;
use crate::TableId;

use super::mechanism::LockingMechanism;
use super::mode::{LockMode, ModeGuard};

/// Lifecycle of a [`LockHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Unacquired,
    Acquired,
    Released,
}

/// The table locks of one logical operation, acquired and released
/// together.
///
/// Created queued but [`HandleState::Unacquired`]. Dropping the handle
/// releases it.
#[derive(Debug)]
pub struct LockHandle {
    id: u64,
    mechanism: Arc<LockingMechanism>,
    writes: Vec<TableId>,
    reads: Vec<TableId>,
    state: HandleState,
}

impl LockHandle {
    pub(super) fn new(
        id: u64,
        mechanism: Arc<LockingMechanism>,
        writes: Vec<TableId>,
        reads: Vec<TableId>,
    ) -> Self {
        Self {
            id,
            mechanism,
            writes,
            reads,
            state: HandleState::Unacquired,
        }
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Tables locked for writing, ascending.
    pub fn write_tables(&self) -> &[TableId] {
        &self.writes
    }

    /// Tables locked only for reading, ascending.
    pub fn read_tables(&self) -> &[TableId] {
        &self.reads
    }

    fn already_acquired(&self) -> Result<bool, DbError> {
        match self.state {
            HandleState::Unacquired => Ok(false),
            HandleState::Acquired => Ok(true),
            HandleState::Released => Err(DbError::Argument(format!(
                "lock handle {} was already released",
                self.id
            ))),
        }
    }

    /// Blocks until every lock of the handle can proceed.
    ///
    /// Fails with [`DbError::Timeout`] once the configured wait bound
    /// passes; the requests stay queued until the handle is released.
    pub fn acquire(&mut self) -> Result<(), DbError> {
        if self.already_acquired()? {
            return Ok(());
        }
        self.mechanism
            .wait_for_tables(self.id, &self.writes, &self.reads)?;
        self.state = HandleState::Acquired;
        Ok(())
    }

    /// Acquires the locks if that needs no waiting.
    pub fn try_acquire(&mut self) -> Result<bool, DbError> {
        if self.already_acquired()? {
            return Ok(true);
        }
        if self.mechanism.tables_ready(self.id, &self.writes, &self.reads) {
            self.state = HandleState::Acquired;
            return Ok(true);
        }
        Ok(false)
    }

    /// Checks that the handle holds `table` for `mode`.
    ///
    /// A write lock also covers reads.
    pub fn check_access(&self, table: TableId, mode: LockMode) -> Result<(), DbError> {
        let held = self.writes.binary_search(&table).is_ok()
            || (mode == LockMode::Read && self.reads.binary_search(&table).is_ok());
        if !held {
            tracing::error!(
                "Lock handle {} accessed table {} for {} without locking it",
                self.id,
                table,
                mode.as_str()
            );
            return Err(DbError::LockOrder {
                table_id: table,
                mode: mode.as_str(),
            });
        }
        if self.state != HandleState::Acquired {
            return Err(DbError::Argument(format!(
                "lock handle {} is {:?}",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Dequeues every lock of the handle. Calling it again is a no-op.
    pub fn release(&mut self) {
        if self.state != HandleState::Released {
            self.state = HandleState::Released;
            self.mechanism
                .release_tables(self.id, &self.writes, &self.reads);
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// An acquired set of table locks plus the database mode they run under.
#[derive(Debug)]
pub struct OperationLock {
    // drops before the mode guard
    handle: LockHandle,
    mode: ModeGuard,
}

impl OperationLock {
    pub(super) fn new(handle: LockHandle, mode: ModeGuard) -> Self {
        Self { handle, mode }
    }

    pub fn handle(&self) -> &LockHandle {
        &self.handle
    }

    pub fn mode(&self) -> &ModeGuard {
        &self.mode
    }

    pub fn check_access(&self, table: TableId, mode: LockMode) -> Result<(), DbError> {
        self.handle.check_access(table, mode)
    }

    /// Releases the table locks, then the database mode.
    pub fn release(mut self) {
        self.handle.release();
        self.mode.release();
    }
}
