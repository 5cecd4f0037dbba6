//! Transactional table storage core for an embeddable relational database.
//!
//! Provides the physical row store with its record-state machine and
//! delete chain, pluggable index structures answering range queries, the
//! per-table event journal behind commit/rollback/merge, the table system
//! that owns every table of a database, and the table locking mechanism.

pub mod blob;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod journal;
pub mod lock;
pub mod storage;
pub mod system;
pub mod table;
pub mod types;

pub use error::DbError;
pub use system::TableSystem;
pub use table::TableSource;

/// Dense, stable identity of a row within one table's slot directory.
pub type RowNumber = usize;

/// Identifier allocated by the table system for each table.
pub type TableId = u32;

/// Strictly increasing identifier of a committed transaction.
pub type CommitId = u64;
