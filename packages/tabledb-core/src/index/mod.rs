//! Index structures mapping a row's key tuple to its row number.
//!
//! Every index implements [`SelectableIndex`]: rows are inserted and
//! removed one at a time, and [`SelectableIndex::select_range`] answers
//! range queries in key order. Two variants exist:
//!
//! - [`BlindIndex`] keeps no order and sorts on demand
//! - [`InsertSortedIndex`] keeps its rows sorted and resolves ranges through
//!   the shared [`CollatedSearch`] algorithm
//!
//! Indexes never own the rows they describe. Keys are read through a
//! borrowed [`RowSource`] supplied with each call.

mod blind;
mod collated;
mod insert_sorted;
mod key;
mod range;
mod set;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::RowNumber;

pub use blind::BlindIndex;
pub use collated::CollatedSearch;
pub use insert_sorted::InsertSortedIndex;
pub use key::IndexKey;
pub use range::{IndexRange, RangeBound, RangeKey, RangeOffset};
pub use set::IndexSet;

/// Read access to the key columns of rows, lent to indexes.
pub trait RowSource: Sync {
    /// Builds the key of `row` from the given columns.
    fn key_of(&self, row: RowNumber, columns: &[usize]) -> Result<IndexKey, DbError>;
}

/// Index variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Blind,
    InsertSorted,
}

/// Creates an empty index of the given kind over `columns`.
pub fn create_index(kind: IndexKind, columns: Vec<usize>) -> Box<dyn SelectableIndex> {
    match kind {
        IndexKind::Blind => Box::new(BlindIndex::new(columns)),
        IndexKind::InsertSorted => Box::new(InsertSortedIndex::new(columns)),
    }
}

/// Capability set shared by every index variant.
pub trait SelectableIndex: fmt::Debug + Send + Sync {
    fn kind(&self) -> IndexKind;

    /// Columns forming the key, in key order.
    fn columns(&self) -> &[usize];

    /// Number of rows indexed.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, source: &dyn RowSource, row: RowNumber) -> Result<(), DbError>;

    fn remove(&mut self, source: &dyn RowSource, row: RowNumber) -> Result<(), DbError>;

    /// Returns the rows of every range in key order, concatenated in range order.
    fn select_range(
        &self,
        source: &dyn RowSource,
        ranges: &[IndexRange],
    ) -> Result<Vec<RowNumber>, DbError>;

    /// Replaces the index contents with `rows`.
    fn rebuild(&mut self, source: &dyn RowSource, rows: &[RowNumber]) -> Result<(), DbError>;

    fn box_clone(&self) -> Box<dyn SelectableIndex>;

    fn select_all(&self, source: &dyn RowSource) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(source, &[IndexRange::full()])
    }

    fn select_equal(
        &self,
        source: &dyn RowSource,
        key: &IndexKey,
    ) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(source, &[IndexRange::equal(key.clone())])
    }

    fn select_not_equal(
        &self,
        source: &dyn RowSource,
        key: &IndexKey,
    ) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(
            source,
            &[IndexRange::less(key.clone()), IndexRange::greater(key.clone())],
        )
    }

    fn select_greater(
        &self,
        source: &dyn RowSource,
        key: &IndexKey,
    ) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(source, &[IndexRange::greater(key.clone())])
    }

    fn select_greater_or_equal(
        &self,
        source: &dyn RowSource,
        key: &IndexKey,
    ) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(source, &[IndexRange::greater_or_equal(key.clone())])
    }

    fn select_less(
        &self,
        source: &dyn RowSource,
        key: &IndexKey,
    ) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(source, &[IndexRange::less(key.clone())])
    }

    fn select_less_or_equal(
        &self,
        source: &dyn RowSource,
        key: &IndexKey,
    ) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(source, &[IndexRange::less_or_equal(key.clone())])
    }

    fn select_between(
        &self,
        source: &dyn RowSource,
        low: &IndexKey,
        high: &IndexKey,
    ) -> Result<Vec<RowNumber>, DbError> {
        self.select_range(source, &[IndexRange::between(low.clone(), high.clone())])
    }

    /// Builds an ordered, read-only view of this index's key over another
    /// table.
    ///
    /// `target_rows[i]` is the row of `source` that row `i` of the target
    /// table resolves to. The result indexes target rows, sorted by the key
    /// of the source row each one resolves to.
    fn project(
        &self,
        source: &dyn RowSource,
        target_rows: &[RowNumber],
    ) -> Result<InsertSortedIndex, DbError> {
        let columns = self.columns().to_vec();
        let mut entries = Vec::with_capacity(target_rows.len());
        for (target_row, &source_row) in target_rows.iter().enumerate() {
            entries.push((source.key_of(source_row, &columns)?, target_row));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(InsertSortedIndex::read_only_from_sorted(columns, entries))
    }
}

impl Clone for Box<dyn SelectableIndex> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
