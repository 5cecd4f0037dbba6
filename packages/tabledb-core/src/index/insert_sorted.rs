use crate::error::DbError;
use crate::RowNumber;

use super::collated::CollatedSearch;
use super::key::IndexKey;
use super::range::IndexRange;
use super::{IndexKind, RowSource, SelectableIndex};

/// Index that keeps its rows persistently sorted by key.
///
/// Rows with equal keys keep their insertion order. Insertions and removals
/// locate their position with a binary search over the sorted keys.
#[derive(Debug, Clone)]
pub struct InsertSortedIndex {
    columns: Vec<usize>,
    entries: Vec<(IndexKey, RowNumber)>,
    read_only: bool,
}

impl InsertSortedIndex {
    pub fn new(columns: Vec<usize>) -> Self {
        Self {
            columns,
            entries: Vec::new(),
            read_only: false,
        }
    }

    /// Wraps entries that are already sorted by key as a read-only index.
    pub(crate) fn read_only_from_sorted(
        columns: Vec<usize>,
        entries: Vec<(IndexKey, RowNumber)>,
    ) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 <= w[1].0));
        Self {
            columns,
            entries,
            read_only: true,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = RowNumber> + '_ {
        self.entries.iter().map(|(_, row)| *row)
    }

    pub fn key_at(&self, position: usize) -> Option<&IndexKey> {
        self.entries.get(position).map(|(key, _)| key)
    }

    fn check_writable(&self) -> Result<(), DbError> {
        if self.read_only {
            return Err(DbError::Argument(
                "projected indexes are read-only".to_string(),
            ));
        }
        Ok(())
    }
}

impl CollatedSearch for InsertSortedIndex {
    fn sorted_len(&self) -> usize {
        self.entries.len()
    }

    fn first_key(&self) -> Option<&IndexKey> {
        self.entries.first().map(|(key, _)| key)
    }

    fn last_key(&self) -> Option<&IndexKey> {
        self.entries.last().map(|(key, _)| key)
    }

    fn search_first(&self, key: &IndexKey) -> Result<usize, usize> {
        let pos = self.entries.partition_point(|(k, _)| k < key);
        match self.entries.get(pos) {
            Some((k, _)) if k == key => Ok(pos),
            _ => Err(pos),
        }
    }

    fn search_last(&self, key: &IndexKey) -> Result<usize, usize> {
        let pos = self.entries.partition_point(|(k, _)| k <= key);
        match pos.checked_sub(1).and_then(|p| self.entries.get(p)) {
            Some((k, _)) if k == key => Ok(pos - 1),
            _ => Err(pos),
        }
    }

    fn push_rows(&self, start: usize, end: usize, out: &mut Vec<RowNumber>) {
        out.extend(self.entries[start..=end].iter().map(|(_, row)| *row));
    }
}

impl SelectableIndex for InsertSortedIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::InsertSorted
    }

    fn columns(&self) -> &[usize] {
        &self.columns
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, source: &dyn RowSource, row: RowNumber) -> Result<(), DbError> {
        self.check_writable()?;
        let key = source.key_of(row, &self.columns)?;
        let pos = self.entries.partition_point(|(k, _)| k <= &key);
        self.entries.insert(pos, (key, row));
        Ok(())
    }

    fn remove(&mut self, source: &dyn RowSource, row: RowNumber) -> Result<(), DbError> {
        self.check_writable()?;
        let key = source.key_of(row, &self.columns)?;
        let first = match self.search_first(&key) {
            Ok(p) => p,
            Err(_) => {
                return Err(DbError::DataCorruption(format!(
                    "key {} of row {} is missing from the index",
                    key, row
                )))
            }
        };
        let offset = self.entries[first..]
            .iter()
            .take_while(|(k, _)| *k == key)
            .position(|(_, r)| *r == row)
            .ok_or_else(|| {
                DbError::DataCorruption(format!("row {} is missing from the index", row))
            })?;
        self.entries.remove(first + offset);
        Ok(())
    }

    fn select_range(
        &self,
        _source: &dyn RowSource,
        ranges: &[IndexRange],
    ) -> Result<Vec<RowNumber>, DbError> {
        Ok(self.collate_ranges(ranges))
    }

    fn rebuild(&mut self, source: &dyn RowSource, rows: &[RowNumber]) -> Result<(), DbError> {
        self.check_writable()?;
        let mut entries = Vec::with_capacity(rows.len());
        for &row in rows {
            entries.push((source.key_of(row, &self.columns)?, row));
        }
        // stable: equal keys keep the order rows were supplied in
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.entries = entries;
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn SelectableIndex> {
        Box::new(self.clone())
    }
}
