use crate::{CommitId, RowNumber, TableId};

use super::event::{EventKind, RowEvent};

/// Row events produced by one transaction against one table.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    table_id: TableId,
    events: Vec<RowEvent>,
}

impl EventRegistry {
    pub fn new(table_id: TableId) -> Self {
        Self {
            table_id,
            events: Vec::new(),
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn add(&mut self, row: RowNumber) {
        self.events.push(RowEvent::new(row, EventKind::Add));
    }

    pub fn remove(&mut self, row: RowNumber) {
        self.events.push(RowEvent::new(row, EventKind::Remove));
    }

    pub fn events(&self) -> &[RowEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Tags the registry with the commit that produced it.
    pub fn seal(self, commit_id: CommitId) -> CommittedRegistry {
        CommittedRegistry {
            table_id: self.table_id,
            commit_id,
            events: self.events,
        }
    }
}

/// Immutable registry of a committed transaction.
#[derive(Debug)]
pub struct CommittedRegistry {
    table_id: TableId,
    commit_id: CommitId,
    events: Vec<RowEvent>,
}

impl CommittedRegistry {
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn commit_id(&self) -> CommitId {
        self.commit_id
    }

    pub fn events(&self) -> &[RowEvent] {
        &self.events
    }

    pub fn added_rows(&self) -> impl Iterator<Item = RowNumber> + '_ {
        self.rows_of(EventKind::Add)
    }

    pub fn removed_rows(&self) -> impl Iterator<Item = RowNumber> + '_ {
        self.rows_of(EventKind::Remove)
    }

    fn rows_of(&self, kind: EventKind) -> impl Iterator<Item = RowNumber> + '_ {
        self.events
            .iter()
            .filter(move |e| e.kind == kind)
            .map(|e| e.row)
    }
}
