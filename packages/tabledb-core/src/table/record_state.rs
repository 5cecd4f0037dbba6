use crate::error::DbError;

/// Commit-visibility state of a row slot.
///
/// Legal transitions:
///
/// ```text
/// Uncommitted ──commit──▶ CommittedAdded ──commit remove──▶ CommittedRemoved ──hard remove──▶ Deleted
///      └───────────────────rollback────────────────────────────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    Uncommitted,
    CommittedAdded,
    CommittedRemoved,
    Deleted,
}

impl RecordState {
    /// Persisted code.
    pub fn code(self) -> i32 {
        match self {
            RecordState::Uncommitted => 0,
            RecordState::CommittedAdded => 0x010,
            RecordState::CommittedRemoved => 0x020,
            RecordState::Deleted => 0x020000,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, DbError> {
        match code {
            0 => Ok(RecordState::Uncommitted),
            0x010 => Ok(RecordState::CommittedAdded),
            0x020 => Ok(RecordState::CommittedRemoved),
            0x020000 => Ok(RecordState::Deleted),
            other => Err(DbError::DataCorruption(format!(
                "unknown record state {:#x}",
                other
            ))),
        }
    }

    /// `true` while the slot still holds a record.
    pub fn is_live(self) -> bool {
        self != RecordState::Deleted
    }
}
