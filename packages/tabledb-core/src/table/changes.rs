use crate::error::DbError;
use crate::index::{IndexRange, IndexSet};
use crate::journal::EventRegistry;
use crate::types::Value;
use crate::{RowNumber, TableId};

use super::source::TableSource;

/// A transaction's uncommitted view of one table.
///
/// Holds a private copy of the committed index set plus the registry of
/// row events to hand to [`TableSource::commit`] or
/// [`TableSource::rollback`].
#[derive(Debug, Clone)]
pub struct PendingChanges {
    registry: EventRegistry,
    indexes: IndexSet,
}

impl PendingChanges {
    pub(crate) fn new(table_id: TableId, indexes: IndexSet) -> Self {
        Self {
            registry: EventRegistry::new(table_id),
            indexes,
        }
    }

    /// Adds a row to the table and to this view.
    pub fn insert_row(&mut self, source: &TableSource, values: &[Value]) -> Result<RowNumber, DbError> {
        let row = source.add_row(values)?;
        self.registry.add(row);
        self.indexes.insert_row(source, row)?;
        Ok(row)
    }

    /// Removes a row from this view.
    pub fn remove_row(&mut self, source: &TableSource, row: RowNumber) -> Result<(), DbError> {
        self.indexes.remove_row(source, row)?;
        self.registry.remove(row);
        Ok(())
    }

    /// Rows visible to this view, ascending.
    pub fn rows(&self) -> &[RowNumber] {
        self.indexes.rows()
    }

    pub fn indexes(&self) -> &IndexSet {
        &self.indexes
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Selects rows of this view through a named index.
    pub fn select_range(
        &self,
        source: &TableSource,
        index: &str,
        ranges: &[IndexRange],
    ) -> Result<Vec<RowNumber>, DbError> {
        self.indexes
            .index_named(index)
            .ok_or_else(|| DbError::IndexNotFound {
                table: source.name().to_string(),
                index: index.to_string(),
            })?
            .select_range(source, ranges)
    }

    pub fn into_parts(self) -> (EventRegistry, IndexSet) {
        (self.registry, self.indexes)
    }
}
