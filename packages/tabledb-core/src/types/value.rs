use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of an out-of-line large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LobKind {
    Binary,
    Text,
}

impl LobKind {
    pub(crate) fn code(self) -> i32 {
        match self {
            LobKind::Binary => 0,
            LobKind::Text => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(LobKind::Binary),
            1 => Some(LobKind::Text),
            _ => None,
        }
    }
}

/// Reference to a large object held in the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LobRef {
    pub kind: LobKind,
    pub id: i64,
}

/// A single cell value.
///
/// Values are totally ordered so they can form index keys: `Null` sorts
/// first, then booleans, numbers (integers and floats compare
/// numerically), text, and large-object references.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    LargeObject(LobRef),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::LargeObject(_) => 4,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the large-object reference held by this value, if any.
    pub fn lob_ref(&self) -> Option<LobRef> {
        match self {
            Value::LargeObject(lob) => Some(*lob),
            _ => None,
        }
    }
}

fn cmp_int_float(i: i64, f: f64) -> Ordering {
    (i as f64).total_cmp(&f).then_with(|| {
        // i64 -> f64 may round; fall back to exact comparison near the boundary
        if f.fract() == 0.0 && f.abs() < 9.2e18 {
            i.cmp(&(f as i64))
        } else {
            Ordering::Equal
        }
    })
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Integer(a), Value::Float(b)) => cmp_int_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => cmp_int_float(*b, *a).reverse(),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::LargeObject(a), Value::LargeObject(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::LargeObject(lob) => write!(f, "<lob {:?} #{}>", lob.kind, lob.id),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Text,
    LargeObject,
}

impl ColumnType {
    /// Returns `true` if a non-null value may be stored in a column of this type.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ColumnType::Boolean, Value::Boolean(_))
                | (ColumnType::Integer, Value::Integer(_))
                | (ColumnType::Float, Value::Float(_))
                | (ColumnType::Float, Value::Integer(_))
                | (ColumnType::Text, Value::Text(_))
                | (ColumnType::LargeObject, Value::LargeObject(_))
        )
    }

    /// Large objects live out of line and cannot be indexed.
    pub fn is_indexable(self) -> bool {
        self != ColumnType::LargeObject
    }
}
