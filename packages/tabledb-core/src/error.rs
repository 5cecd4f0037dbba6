//! Storage core error types.

use thiserror::Error;

use crate::table::RecordState;
use crate::{RowNumber, TableId};

/// Storage core errors.
#[derive(Error, Debug, Clone)]
pub enum DbError {
    /// An expected record-state transition did not hold
    #[error(
        "Consistency error in table {table_id}, row {row}: expected {expected:?}, found {found:?}"
    )]
    Consistency {
        table_id: TableId,
        row: RowNumber,
        expected: RecordState,
        found: RecordState,
    },

    /// The backing medium failed a read, write or flush
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    /// The backing store could not be initialised
    #[error("Storage init error: {0}")]
    StorageInit(String),

    /// Access checked against a table the handle never locked
    #[error("Lock order error: table {table_id} was not locked for {mode}")]
    LockOrder { table_id: TableId, mode: &'static str },

    /// Table not found
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    /// Table id not found
    #[error("Table id {0} not found")]
    TableIdNotFound(TableId),

    /// Table already exists
    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    /// Column not found in table
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Row not found or already reclaimed
    #[error("Row {row} not found in table '{table}'")]
    RowNotFound { table: String, row: RowNumber },

    /// Index not found in table
    #[error("Index '{index}' not found in table '{table}'")]
    IndexNotFound { table: String, index: String },

    /// Malformed argument at the API boundary
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Table still holds root locks
    #[error("Table '{table}' is in use ({locks} root locks held)")]
    TableInUse { table: String, locks: usize },

    /// Operation on a table that has been closed
    #[error("Table '{0}' is closed")]
    TableClosed(String),

    /// Data corruption detected while decoding persisted state
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Lock poisoned (RwLock poisoned)
    #[error("Lock poisoned")]
    LockPoisoned,

    /// Lock wait exceeded the configured bound
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl DbError {
    /// Returns `true` for errors that leave the affected table unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DbError::Consistency { .. } | DbError::LockOrder { .. } | DbError::DataCorruption(_)
        )
    }
}
