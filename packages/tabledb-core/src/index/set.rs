use crate::error::DbError;
use crate::RowNumber;

use super::{IndexKind, IndexRange, RowSource, SelectableIndex};

/// A table's committed rows plus every index defined over them.
///
/// The committed set is shared read-only; transactions work on their own
/// clone, and a commit replays their row changes onto the committed set.
#[derive(Debug, Clone)]
pub struct IndexSet {
    rows: Vec<RowNumber>,
    names: Vec<String>,
    indexes: Vec<Box<dyn SelectableIndex>>,
}

impl IndexSet {
    /// Creates an empty set holding the given named indexes.
    pub fn new(indexes: Vec<(String, Box<dyn SelectableIndex>)>) -> Self {
        let (names, indexes) = indexes.into_iter().unzip();
        Self {
            rows: Vec::new(),
            names,
            indexes,
        }
    }

    /// Row numbers in the set, ascending.
    pub fn rows(&self) -> &[RowNumber] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn contains(&self, row: RowNumber) -> bool {
        self.rows.binary_search(&row).is_ok()
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    pub fn index_names(&self) -> &[String] {
        &self.names
    }

    pub fn index(&self, position: usize) -> Option<&dyn SelectableIndex> {
        self.indexes.get(position).map(|i| i.as_ref())
    }

    pub fn index_named(&self, name: &str) -> Option<&dyn SelectableIndex> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|p| self.index(p))
    }

    /// The first index whose key starts with `column`.
    pub fn index_for_column(&self, column: usize) -> Option<&dyn SelectableIndex> {
        self.indexes
            .iter()
            .find(|i| i.columns().first() == Some(&column))
            .map(|i| i.as_ref())
    }

    /// Adds a row to the set and to every index.
    pub fn insert_row(&mut self, source: &dyn RowSource, row: RowNumber) -> Result<(), DbError> {
        let pos = match self.rows.binary_search(&row) {
            Ok(_) => {
                return Err(DbError::Argument(format!(
                    "row {} is already in the index set",
                    row
                )))
            }
            Err(pos) => pos,
        };
        for index in &mut self.indexes {
            index.insert(source, row)?;
        }
        self.rows.insert(pos, row);
        Ok(())
    }

    /// Removes a row from the set and from every index.
    pub fn remove_row(&mut self, source: &dyn RowSource, row: RowNumber) -> Result<(), DbError> {
        let pos = self.rows.binary_search(&row).map_err(|_| {
            DbError::Argument(format!("row {} is not in the index set", row))
        })?;
        for index in &mut self.indexes {
            index.remove(source, row)?;
        }
        self.rows.remove(pos);
        Ok(())
    }

    /// Selects rows from the index at `position`.
    pub fn select(
        &self,
        source: &dyn RowSource,
        position: usize,
        ranges: &[IndexRange],
    ) -> Result<Vec<RowNumber>, DbError> {
        let index = self.index(position).ok_or_else(|| {
            DbError::Argument(format!("index position {} out of range", position))
        })?;
        index.select_range(source, ranges)
    }

    /// Replaces the set contents with `rows` and rebuilds every index.
    pub fn rebuild(&mut self, source: &dyn RowSource, rows: Vec<RowNumber>) -> Result<(), DbError> {
        let mut rows = rows;
        rows.sort_unstable();
        rows.dedup();

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.indexes
                .par_iter_mut()
                .try_for_each(|index| index.rebuild(source, &rows))?;
        }
        #[cfg(not(feature = "parallel"))]
        for index in &mut self.indexes {
            index.rebuild(source, &rows)?;
        }

        self.rows = rows;
        Ok(())
    }

    /// Kinds of the indexes in the set, in definition order.
    pub fn kinds(&self) -> Vec<IndexKind> {
        self.indexes.iter().map(|i| i.kind()).collect()
    }
}
