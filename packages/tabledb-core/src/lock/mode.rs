use std::sync::Arc;

use super::mechanism::LockingMechanism;

/// Kind of access a lock request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Read,
    Write,
}

impl LockMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::Read => "read",
            LockMode::Write => "write",
        }
    }
}

/// Whole-database mode.
///
/// `Exclusive` waits for every `Shared` user to finish and keeps new ones
/// out until released. Schema-altering operations run exclusive; everything
/// else shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseMode {
    Exclusive,
    Shared,
}

/// Holds a database mode until dropped.
#[derive(Debug)]
pub struct ModeGuard {
    mechanism: Arc<LockingMechanism>,
    mode: DatabaseMode,
    released: bool,
}

impl ModeGuard {
    pub(super) fn new(mechanism: Arc<LockingMechanism>, mode: DatabaseMode) -> Self {
        Self {
            mechanism,
            mode,
            released: false,
        }
    }

    pub fn mode(&self) -> DatabaseMode {
        self.mode
    }

    /// Gives the mode back. Calling it again is a no-op.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.mechanism.finish_mode(self.mode);
        }
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        self.release();
    }
}
