use crate::RowNumber;

/// Kind of row event recorded in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Remove,
}

/// One row add or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowEvent {
    pub row: RowNumber,
    pub kind: EventKind,
}

impl RowEvent {
    pub fn new(row: RowNumber, kind: EventKind) -> Self {
        Self { row, kind }
    }
}
