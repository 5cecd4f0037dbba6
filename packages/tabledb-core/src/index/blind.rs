use crate::error::DbError;
use crate::RowNumber;

use super::key::IndexKey;
use super::range::{IndexRange, RangeBound, RangeKey, RangeOffset};
use super::{IndexKind, RowSource, SelectableIndex};

/// Index that keeps no order at all.
///
/// Rows are held in arrival order and sorted on demand when a query asks
/// for them, which is cheaper than maintaining order for small or rarely
/// queried tables.
#[derive(Debug, Clone)]
pub struct BlindIndex {
    columns: Vec<usize>,
    rows: Vec<RowNumber>,
}

/// Returns the position after the last key in `keys[lower..upper]` that is
/// not greater than `key`. `keys` must be sorted.
fn highest_insertion_point(key: &IndexKey, keys: &[IndexKey], lower: usize, upper: usize) -> usize {
    if lower >= upper {
        return lower;
    }
    let mid = lower + (upper - lower) / 2;
    if keys[mid] <= *key {
        highest_insertion_point(key, keys, mid + 1, upper)
    } else {
        highest_insertion_point(key, keys, lower, mid)
    }
}

#[derive(Debug, Default)]
struct InsertionSort {
    keys: Vec<IndexKey>,
    rows: Vec<RowNumber>,
}

impl InsertionSort {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    fn add(&mut self, key: IndexKey, row: RowNumber) {
        let pos = highest_insertion_point(&key, &self.keys, 0, self.keys.len());
        self.keys.insert(pos, key);
        self.rows.insert(pos, row);
    }
}

#[derive(Debug)]
enum Lower {
    Unbounded,
    Inclusive(IndexKey),
    Exclusive(IndexKey),
    Empty,
}

#[derive(Debug)]
enum Upper {
    Unbounded,
    Inclusive(IndexKey),
    Exclusive(IndexKey),
    Empty,
}

impl Lower {
    fn admits(&self, key: &IndexKey) -> bool {
        match self {
            Lower::Unbounded => true,
            Lower::Inclusive(k) => key >= k,
            Lower::Exclusive(k) => key > k,
            Lower::Empty => false,
        }
    }
}

impl Upper {
    fn admits(&self, key: &IndexKey) -> bool {
        match self {
            Upper::Unbounded => true,
            Upper::Inclusive(k) => key <= k,
            Upper::Exclusive(k) => key < k,
            Upper::Empty => false,
        }
    }
}

/// Smallest and largest key of the index, computed on first use.
struct Extremes<'a> {
    index: &'a BlindIndex,
    source: &'a dyn RowSource,
    resolved: Option<(IndexKey, IndexKey)>,
}

impl<'a> Extremes<'a> {
    fn get(&mut self) -> Result<&(IndexKey, IndexKey), DbError> {
        if self.resolved.is_none() {
            let mut min: Option<IndexKey> = None;
            let mut max: Option<IndexKey> = None;
            for &row in &self.index.rows {
                let key = self.index.key(self.source, row)?;
                if min.as_ref().map_or(true, |m| key < *m) {
                    min = Some(key.clone());
                }
                if max.as_ref().map_or(true, |m| key > *m) {
                    max = Some(key);
                }
            }
            self.resolved = min.zip(max);
        }
        self.resolved.as_ref().ok_or_else(|| {
            DbError::Argument("set extremes requested from an empty index".to_string())
        })
    }

    fn first(&mut self) -> Result<IndexKey, DbError> {
        Ok(self.get()?.0.clone())
    }

    fn last(&mut self) -> Result<IndexKey, DbError> {
        Ok(self.get()?.1.clone())
    }
}

fn resolve_lower(bound: &RangeBound, extremes: &mut Extremes<'_>) -> Result<Lower, DbError> {
    Ok(match (bound.offset, &bound.key) {
        (RangeOffset::FirstValue, RangeKey::FirstInSet) => Lower::Unbounded,
        (RangeOffset::AfterLastValue, RangeKey::LastInSet) => Lower::Empty,
        (RangeOffset::FirstValue, RangeKey::LastInSet) => Lower::Inclusive(extremes.last()?),
        (RangeOffset::AfterLastValue, RangeKey::FirstInSet) => {
            Lower::Exclusive(extremes.first()?)
        }
        (RangeOffset::FirstValue, RangeKey::Key(k)) => Lower::Inclusive(k.clone()),
        (RangeOffset::AfterLastValue, RangeKey::Key(k)) => Lower::Exclusive(k.clone()),
        (offset, _) => {
            return Err(DbError::Argument(format!(
                "{:?} cannot start a range",
                offset
            )))
        }
    })
}

fn resolve_upper(bound: &RangeBound, extremes: &mut Extremes<'_>) -> Result<Upper, DbError> {
    Ok(match (bound.offset, &bound.key) {
        (RangeOffset::LastValue, RangeKey::LastInSet) => Upper::Unbounded,
        (RangeOffset::BeforeFirstValue, RangeKey::FirstInSet) => Upper::Empty,
        (RangeOffset::LastValue, RangeKey::FirstInSet) => Upper::Inclusive(extremes.first()?),
        (RangeOffset::BeforeFirstValue, RangeKey::LastInSet) => {
            Upper::Exclusive(extremes.last()?)
        }
        (RangeOffset::LastValue, RangeKey::Key(k)) => Upper::Inclusive(k.clone()),
        (RangeOffset::BeforeFirstValue, RangeKey::Key(k)) => Upper::Exclusive(k.clone()),
        (offset, _) => {
            return Err(DbError::Argument(format!(
                "{:?} cannot end a range",
                offset
            )))
        }
    })
}

impl BlindIndex {
    pub fn new(columns: Vec<usize>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    fn key(&self, source: &dyn RowSource, row: RowNumber) -> Result<IndexKey, DbError> {
        source.key_of(row, &self.columns)
    }

    fn sort_all(&self, source: &dyn RowSource) -> Result<Vec<RowNumber>, DbError> {
        let mut sorted = InsertionSort::with_capacity(self.rows.len());
        for &row in &self.rows {
            sorted.add(self.key(source, row)?, row);
        }
        Ok(sorted.rows)
    }
}

impl SelectableIndex for BlindIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Blind
    }

    fn columns(&self) -> &[usize] {
        &self.columns
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn insert(&mut self, _source: &dyn RowSource, row: RowNumber) -> Result<(), DbError> {
        self.rows.push(row);
        Ok(())
    }

    fn remove(&mut self, _source: &dyn RowSource, row: RowNumber) -> Result<(), DbError> {
        let pos = self
            .rows
            .iter()
            .position(|r| *r == row)
            .ok_or_else(|| {
                DbError::DataCorruption(format!("row {} is missing from the index", row))
            })?;
        self.rows.swap_remove(pos);
        Ok(())
    }

    fn select_range(
        &self,
        source: &dyn RowSource,
        ranges: &[IndexRange],
    ) -> Result<Vec<RowNumber>, DbError> {
        if ranges.is_empty() || self.rows.is_empty() {
            return Ok(Vec::new());
        }
        if ranges.len() == 1 && ranges[0].is_full() {
            return self.sort_all(source);
        }

        let mut extremes = Extremes {
            index: self,
            source,
            resolved: None,
        };
        let mut checks = Vec::with_capacity(ranges.len());
        for range in ranges {
            let lower = resolve_lower(&range.start, &mut extremes)?;
            let upper = resolve_upper(&range.end, &mut extremes)?;
            if !matches!(lower, Lower::Empty) && !matches!(upper, Upper::Empty) {
                checks.push((lower, upper));
            }
        }
        if checks.is_empty() {
            return Ok(Vec::new());
        }

        let mut sorted = InsertionSort::default();
        for &row in &self.rows {
            let key = self.key(source, row)?;
            if checks
                .iter()
                .any(|(lower, upper)| lower.admits(&key) && upper.admits(&key))
            {
                sorted.add(key, row);
            }
        }
        Ok(sorted.rows)
    }

    fn rebuild(&mut self, _source: &dyn RowSource, rows: &[RowNumber]) -> Result<(), DbError> {
        self.rows = rows.to_vec();
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn SelectableIndex> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
pub(super) fn insertion_point_for_test(key: &IndexKey, keys: &[IndexKey]) -> usize {
    highest_insertion_point(key, keys, 0, keys.len())
}
