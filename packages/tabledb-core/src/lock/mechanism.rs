use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::DbError;
use crate::TableId;

use super::handle::{LockHandle, OperationLock};
use super::mode::{DatabaseMode, LockMode, ModeGuard};

#[derive(Debug, Clone, Copy)]
struct Request {
    handle: u64,
    mode: LockMode,
}

#[derive(Debug, Default)]
struct LockQueues {
    queues: HashMap<TableId, VecDeque<Request>>,
    next_handle: u64,
    shared_users: usize,
    exclusive: bool,
    exclusive_waiting: usize,
}

impl LockQueues {
    /// A write proceeds at the head of its queue; a read once no write is
    /// queued ahead of it.
    fn can_proceed(&self, handle: u64, table: TableId, mode: LockMode) -> bool {
        let Some(queue) = self.queues.get(&table) else {
            return false;
        };
        match mode {
            LockMode::Write => queue.front().is_some_and(|r| r.handle == handle),
            LockMode::Read => {
                for request in queue {
                    if request.handle == handle {
                        return true;
                    }
                    if request.mode == LockMode::Write {
                        return false;
                    }
                }
                false
            }
        }
    }

    fn ready(&self, handle: u64, writes: &[TableId], reads: &[TableId]) -> bool {
        writes
            .iter()
            .all(|&t| self.can_proceed(handle, t, LockMode::Write))
            && reads
                .iter()
                .all(|&t| self.can_proceed(handle, t, LockMode::Read))
    }

    fn mode_available(&self, mode: DatabaseMode) -> bool {
        match mode {
            DatabaseMode::Exclusive => !self.exclusive && self.shared_users == 0,
            DatabaseMode::Shared => !self.exclusive && self.exclusive_waiting == 0,
        }
    }
}

/// Arbitrates read and write access to tables across the whole database.
///
/// Every table has a FIFO queue of lock requests. A handle's requests are
/// enqueued in one step, writes before reads and each group in ascending
/// table order, so two handles can never wait on each other across
/// tables. Waiters block on a condition variable and recheck whenever any
/// lock is released.
#[derive(Debug)]
pub struct LockingMechanism {
    state: Mutex<LockQueues>,
    released: Condvar,
    wait_timeout: Option<Duration>,
}

impl Default for LockingMechanism {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LockingMechanism {
    /// Creates a mechanism whose waits give up after `wait_timeout`.
    pub fn new(wait_timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(LockQueues::default()),
            released: Condvar::new(),
            wait_timeout,
        }
    }

    fn wait(
        &self,
        state: &mut MutexGuard<'_, LockQueues>,
        started: Instant,
        what: &'static str,
    ) -> Result<(), DbError> {
        match self.wait_timeout {
            None => {
                self.released.wait(state);
                Ok(())
            }
            Some(timeout) => {
                let remaining = timeout.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(DbError::Timeout(what));
                }
                self.released.wait_for(state, remaining);
                Ok(())
            }
        }
    }

    /// Enqueues read and write locks for one operation and returns the
    /// handle, not yet acquired.
    ///
    /// A table in both sets is locked for writing only.
    pub fn lock_tables(
        self: &Arc<Self>,
        write: &[TableId],
        read: &[TableId],
    ) -> LockHandle {
        let mut writes = write.to_vec();
        writes.sort_unstable();
        writes.dedup();
        let mut reads: Vec<TableId> = read
            .iter()
            .copied()
            .filter(|t| writes.binary_search(t).is_err())
            .collect();
        reads.sort_unstable();
        reads.dedup();

        let id = {
            let mut state = self.state.lock();
            let id = state.next_handle;
            state.next_handle += 1;
            for &table in &writes {
                state.queues.entry(table).or_default().push_back(Request {
                    handle: id,
                    mode: LockMode::Write,
                });
            }
            for &table in &reads {
                state.queues.entry(table).or_default().push_back(Request {
                    handle: id,
                    mode: LockMode::Read,
                });
            }
            id
        };

        tracing::debug!(
            "Lock handle {} queued writes {:?} reads {:?}",
            id,
            writes,
            reads
        );
        LockHandle::new(id, Arc::clone(self), writes, reads)
    }

    pub(super) fn tables_ready(&self, handle: u64, writes: &[TableId], reads: &[TableId]) -> bool {
        self.state.lock().ready(handle, writes, reads)
    }

    pub(super) fn wait_for_tables(
        &self,
        handle: u64,
        writes: &[TableId],
        reads: &[TableId],
    ) -> Result<(), DbError> {
        let started = Instant::now();
        let mut state = self.state.lock();
        while !state.ready(handle, writes, reads) {
            self.wait(&mut state, started, "table locks")?;
        }
        Ok(())
    }

    pub(super) fn release_tables(&self, handle: u64, writes: &[TableId], reads: &[TableId]) {
        {
            let mut state = self.state.lock();
            for table in writes.iter().chain(reads) {
                let emptied = match state.queues.get_mut(table) {
                    Some(queue) => {
                        queue.retain(|r| r.handle != handle);
                        queue.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    state.queues.remove(table);
                }
            }
        }
        self.released.notify_all();
        tracing::debug!("Lock handle {} released", handle);
    }

    /// Enters a database mode, blocking until it is available.
    pub fn set_mode(self: &Arc<Self>, mode: DatabaseMode) -> Result<ModeGuard, DbError> {
        let started = Instant::now();
        let mut state = self.state.lock();
        if mode == DatabaseMode::Exclusive {
            state.exclusive_waiting += 1;
        }
        while !state.mode_available(mode) {
            if let Err(e) = self.wait(&mut state, started, "database mode") {
                if mode == DatabaseMode::Exclusive {
                    state.exclusive_waiting -= 1;
                    drop(state);
                    self.released.notify_all();
                }
                return Err(e);
            }
        }
        match mode {
            DatabaseMode::Exclusive => {
                state.exclusive_waiting -= 1;
                state.exclusive = true;
            }
            DatabaseMode::Shared => state.shared_users += 1,
        }
        drop(state);
        Ok(ModeGuard::new(Arc::clone(self), mode))
    }

    pub(super) fn finish_mode(&self, mode: DatabaseMode) {
        {
            let mut state = self.state.lock();
            match mode {
                DatabaseMode::Exclusive => state.exclusive = false,
                DatabaseMode::Shared => {
                    state.shared_users = state.shared_users.saturating_sub(1)
                }
            }
        }
        self.released.notify_all();
    }

    /// Enters `mode`, then enqueues and acquires the table locks.
    pub fn lock_operation(
        self: &Arc<Self>,
        mode: DatabaseMode,
        write: &[TableId],
        read: &[TableId],
    ) -> Result<OperationLock, DbError> {
        let guard = self.set_mode(mode)?;
        let mut handle = self.lock_tables(write, read);
        handle.acquire()?;
        Ok(OperationLock::new(handle, guard))
    }

    /// Requests queued against `table`, granted or not.
    pub fn queue_len(&self, table: TableId) -> usize {
        self.state.lock().queues.get(&table).map_or(0, VecDeque::len)
    }

    pub fn shared_users(&self) -> usize {
        self.state.lock().shared_users
    }

    pub fn is_exclusive(&self) -> bool {
        self.state.lock().exclusive
    }
}
