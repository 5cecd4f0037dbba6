//! Table schema and index-set metadata, persisted as JSON in their own areas.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::index::{create_index, IndexKind, IndexSet};
use crate::types::{ColumnType, Value};

/// Column definition within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Declared type
    pub column_type: ColumnType,
    /// Whether the column accepts `Null`
    pub nullable: bool,
}

impl ColumnDef {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }

    /// Marks the column as not accepting `Null`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// Column definitions in declaration order
    pub columns: Vec<ColumnDef>,
}

impl TableInfo {
    /// Creates a schema, validating the name and column names.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Result<Self, DbError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DbError::Argument("table name must not be empty".into()));
        }
        if columns.is_empty() {
            return Err(DbError::Argument(format!(
                "table '{}' must have at least one column",
                name
            )));
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if column.name.trim().is_empty() {
                return Err(DbError::Argument(format!(
                    "table '{}' has a column without a name",
                    name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(DbError::Argument(format!(
                    "column '{}' declared twice in table '{}'",
                    column.name, name
                )));
            }
        }
        Ok(Self { name, columns })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the position of a column by name.
    pub fn column_index(&self, column: &str) -> Result<usize, DbError> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| DbError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Validates a row's arity and cell types against the schema.
    pub fn check_row(&self, values: &[Value]) -> Result<(), DbError> {
        if values.len() != self.columns.len() {
            return Err(DbError::Argument(format!(
                "table '{}' has {} columns, got {} values",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(values) {
            let ok = if value.is_null() {
                column.nullable
            } else {
                column.column_type.accepts(value)
            };
            if !ok {
                return Err(DbError::Argument(format!(
                    "value {} does not fit column '{}' ({:?}{})",
                    value,
                    column.name,
                    column.column_type,
                    if column.nullable { "" } else { ", not null" }
                )));
            }
        }
        Ok(())
    }
}

/// Definition of one index over a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name
    pub name: String,
    /// Key columns, in key order
    pub columns: Vec<String>,
    /// Index variant
    pub kind: IndexKind,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: &[&str], kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind,
        }
    }
}

/// The set of indexes maintained for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSetInfo {
    pub indexes: Vec<IndexDef>,
}

impl IndexSetInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an index definition.
    pub fn with_index(mut self, def: IndexDef) -> Self {
        self.indexes.push(def);
        self
    }

    /// One single-column index per indexable column, named after the column.
    pub fn per_column(info: &TableInfo, kind: IndexKind) -> Self {
        Self {
            indexes: info
                .columns
                .iter()
                .filter(|c| c.column_type.is_indexable())
                .map(|c| IndexDef::new(c.name.clone(), &[c.name.as_str()], kind))
                .collect(),
        }
    }

    /// Resolves column names to positions, validating every definition.
    pub fn resolve(&self, info: &TableInfo) -> Result<Vec<(String, IndexKind, Vec<usize>)>, DbError> {
        let mut names = HashSet::new();
        let mut resolved = Vec::with_capacity(self.indexes.len());
        for def in &self.indexes {
            if !names.insert(def.name.as_str()) {
                return Err(DbError::Argument(format!(
                    "index '{}' declared twice on table '{}'",
                    def.name, info.name
                )));
            }
            if def.columns.is_empty() {
                return Err(DbError::Argument(format!(
                    "index '{}' has no key columns",
                    def.name
                )));
            }
            let mut columns = Vec::with_capacity(def.columns.len());
            for column in &def.columns {
                let position = info.column_index(column)?;
                if !info.columns[position].column_type.is_indexable() {
                    return Err(DbError::Argument(format!(
                        "column '{}' of table '{}' holds large objects and cannot be indexed",
                        column, info.name
                    )));
                }
                columns.push(position);
            }
            resolved.push((def.name.clone(), def.kind, columns));
        }
        Ok(resolved)
    }

    /// Builds an empty index set for the table.
    pub fn create_index_set(&self, info: &TableInfo) -> Result<IndexSet, DbError> {
        let indexes = self
            .resolve(info)?
            .into_iter()
            .map(|(name, kind, columns)| (name, create_index(kind, columns)))
            .collect();
        Ok(IndexSet::new(indexes))
    }
}
