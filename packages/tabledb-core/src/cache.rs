//! Cell cache collaborator interface.
//!
//! The cache itself (and its eviction policy) lives outside the storage
//! core. Tables consult it before decoding a cell and must invalidate every
//! cell of a row before the row's slot can be reused.

use crate::types::Value;
use crate::{RowNumber, TableId};

/// Cache of decoded cells keyed by table, row and column.
pub trait CellCache: Send + Sync + std::fmt::Debug {
    /// Returns a cached cell.
    fn get(&self, table_id: TableId, row: RowNumber, column: usize) -> Option<Value>;

    /// Caches a decoded cell.
    fn put(&self, table_id: TableId, row: RowNumber, column: usize, value: Value);

    /// Drops a cell from the cache.
    fn invalidate(&self, table_id: TableId, row: RowNumber, column: usize);
}
