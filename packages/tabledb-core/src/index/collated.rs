//! Range resolution shared by every index that keeps its rows in key order.

use crate::RowNumber;

use super::key::IndexKey;
use super::range::{IndexRange, RangeBound, RangeKey, RangeOffset};

/// A sorted sequence of rows that can resolve range bounds to positions.
///
/// Implementors provide lookups over their sorted order; the provided
/// methods turn `(offset, key)` bounds into concrete positions and collect
/// the rows between them.
pub trait CollatedSearch {
    /// Number of rows in sorted order.
    fn sorted_len(&self) -> usize;

    /// Key at the first sorted position, if any.
    fn first_key(&self) -> Option<&IndexKey>;

    /// Key at the last sorted position, if any.
    fn last_key(&self) -> Option<&IndexKey>;

    /// Position of the first occurrence of `key`, or `Err` with the
    /// position it would be inserted at.
    fn search_first(&self, key: &IndexKey) -> Result<usize, usize>;

    /// Position of the last occurrence of `key`, or `Err` with the
    /// position it would be inserted at.
    fn search_last(&self, key: &IndexKey) -> Result<usize, usize>;

    /// Appends rows at sorted positions `start..=end` to `out`.
    fn push_rows(&self, start: usize, end: usize, out: &mut Vec<RowNumber>);

    /// Resolves a bound to a position in `-1..=sorted_len()`.
    ///
    /// Must only be called on a non-empty sequence.
    fn position_of(&self, bound: &RangeBound) -> isize {
        let len = self.sorted_len() as isize;
        let key = match (&bound.key, bound.offset) {
            (RangeKey::FirstInSet, RangeOffset::FirstValue) => return 0,
            (RangeKey::FirstInSet, RangeOffset::BeforeFirstValue) => return -1,
            (RangeKey::LastInSet, RangeOffset::LastValue) => return len - 1,
            (RangeKey::LastInSet, RangeOffset::AfterLastValue) => return len,
            (RangeKey::FirstInSet, _) => self.first_key(),
            (RangeKey::LastInSet, _) => self.last_key(),
            (RangeKey::Key(key), _) => Some(key),
        };
        let Some(key) = key else {
            return 0;
        };

        let first = |key: &IndexKey| match self.search_first(key) {
            Ok(p) | Err(p) => p as isize,
        };
        let last = |key: &IndexKey| match self.search_last(key) {
            Ok(p) => p as isize,
            Err(p) => p as isize - 1,
        };

        match bound.offset {
            RangeOffset::FirstValue => first(key),
            RangeOffset::LastValue => last(key),
            RangeOffset::BeforeFirstValue => first(key) - 1,
            RangeOffset::AfterLastValue => last(key) + 1,
        }
    }

    /// Collects the rows of every range, in range order.
    ///
    /// Slices are concatenated as resolved: rows covered by two overlapping
    /// ranges are returned twice.
    fn collate_ranges(&self, ranges: &[IndexRange]) -> Vec<RowNumber> {
        let len = self.sorted_len();
        let mut out = Vec::new();
        if len == 0 {
            return out;
        }
        for range in ranges {
            let start = self.position_of(&range.start).max(0);
            let end = self.position_of(&range.end).min(len as isize - 1);
            if start <= end {
                self.push_rows(start as usize, end as usize, &mut out);
            }
        }
        out
    }
}
