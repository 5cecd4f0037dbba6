//! Range bounds expressed as (offset-kind, key) pairs.

use crate::error::DbError;

use super::key::IndexKey;

/// Where a bound sits relative to the occurrences of its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOffset {
    /// The first occurrence of the key (inclusive start)
    FirstValue,
    /// The last occurrence of the key (inclusive end)
    LastValue,
    /// Just before the first occurrence (exclusive end)
    BeforeFirstValue,
    /// Just after the last occurrence (exclusive start)
    AfterLastValue,
}

/// Key of a range bound. The sentinels denote the ends of the set and never
/// compare equal to a real key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeKey {
    FirstInSet,
    LastInSet,
    Key(IndexKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBound {
    pub offset: RangeOffset,
    pub key: RangeKey,
}

impl RangeBound {
    pub fn new(offset: RangeOffset, key: RangeKey) -> Self {
        Self { offset, key }
    }
}

/// A range of an index, from `start` to `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRange {
    pub start: RangeBound,
    pub end: RangeBound,
}

impl IndexRange {
    /// Creates a range, checking that `start` is a start bound and `end` an end bound.
    pub fn new(start: RangeBound, end: RangeBound) -> Result<Self, DbError> {
        if !matches!(
            start.offset,
            RangeOffset::FirstValue | RangeOffset::AfterLastValue
        ) {
            return Err(DbError::Argument(format!(
                "{:?} cannot start a range",
                start.offset
            )));
        }
        if !matches!(
            end.offset,
            RangeOffset::LastValue | RangeOffset::BeforeFirstValue
        ) {
            return Err(DbError::Argument(format!(
                "{:?} cannot end a range",
                end.offset
            )));
        }
        Ok(Self { start, end })
    }

    fn from_parts(start: RangeBound, end: RangeBound) -> Self {
        Self { start, end }
    }

    /// Every row of the index.
    pub fn full() -> Self {
        Self::from_parts(
            RangeBound::new(RangeOffset::FirstValue, RangeKey::FirstInSet),
            RangeBound::new(RangeOffset::LastValue, RangeKey::LastInSet),
        )
    }

    pub fn equal(key: IndexKey) -> Self {
        Self::from_parts(
            RangeBound::new(RangeOffset::FirstValue, RangeKey::Key(key.clone())),
            RangeBound::new(RangeOffset::LastValue, RangeKey::Key(key)),
        )
    }

    pub fn greater(key: IndexKey) -> Self {
        Self::from_parts(
            RangeBound::new(RangeOffset::AfterLastValue, RangeKey::Key(key)),
            RangeBound::new(RangeOffset::LastValue, RangeKey::LastInSet),
        )
    }

    pub fn greater_or_equal(key: IndexKey) -> Self {
        Self::from_parts(
            RangeBound::new(RangeOffset::FirstValue, RangeKey::Key(key)),
            RangeBound::new(RangeOffset::LastValue, RangeKey::LastInSet),
        )
    }

    pub fn less(key: IndexKey) -> Self {
        Self::from_parts(
            RangeBound::new(RangeOffset::FirstValue, RangeKey::FirstInSet),
            RangeBound::new(RangeOffset::BeforeFirstValue, RangeKey::Key(key)),
        )
    }

    pub fn less_or_equal(key: IndexKey) -> Self {
        Self::from_parts(
            RangeBound::new(RangeOffset::FirstValue, RangeKey::FirstInSet),
            RangeBound::new(RangeOffset::LastValue, RangeKey::Key(key)),
        )
    }

    /// Inclusive on both ends.
    pub fn between(low: IndexKey, high: IndexKey) -> Self {
        Self::from_parts(
            RangeBound::new(RangeOffset::FirstValue, RangeKey::Key(low)),
            RangeBound::new(RangeOffset::LastValue, RangeKey::Key(high)),
        )
    }

    pub fn is_full(&self) -> bool {
        self.start.offset == RangeOffset::FirstValue
            && self.start.key == RangeKey::FirstInSet
            && self.end.offset == RangeOffset::LastValue
            && self.end.key == RangeKey::LastInSet
    }
}
