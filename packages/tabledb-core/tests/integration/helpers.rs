//! Shared fixtures for the integration tests.

use std::path::Path;
use std::sync::Arc;

use tabledb_core::config::StoreConfig;
use tabledb_core::index::IndexKind;
use tabledb_core::table::{ColumnDef, IndexDef, IndexSetInfo, TableInfo};
use tabledb_core::types::{ColumnType, Value};
use tabledb_core::{RowNumber, TableSource, TableSystem};

pub fn config(dir: &Path) -> StoreConfig {
    StoreConfig {
        persistence_retry_delay_ms: 0,
        ..StoreConfig::with_data_dir(dir)
    }
}

pub fn open_system(dir: &Path) -> TableSystem {
    TableSystem::open(config(dir)).unwrap()
}

/// T(id, name) with an ordered index on `id` and a blind one on `name`.
pub fn table_t() -> (TableInfo, IndexSetInfo) {
    let info = TableInfo::new(
        "t",
        vec![
            ColumnDef::new("id", ColumnType::Integer).not_null(),
            ColumnDef::new("name", ColumnType::Text),
        ],
    )
    .unwrap();
    let indexes = IndexSetInfo::new()
        .with_index(IndexDef::new("by_id", &["id"], IndexKind::InsertSorted))
        .with_index(IndexDef::new("by_name", &["name"], IndexKind::Blind));
    (info, indexes)
}

pub fn create_t(system: &TableSystem) -> Arc<TableSource> {
    let (info, indexes) = table_t();
    system.create_table(info, indexes).unwrap()
}

/// T's columns plus a large-object column, no indexes.
pub fn create_docs(system: &TableSystem) -> Arc<TableSource> {
    let (info, _) = table_t();
    let mut columns = info.columns;
    columns.push(ColumnDef::new("doc", ColumnType::LargeObject));
    system
        .create_table(
            TableInfo::new("docs", columns).unwrap(),
            IndexSetInfo::new(),
        )
        .unwrap()
}

pub fn row(id: i64, name: &str) -> Vec<Value> {
    vec![Value::Integer(id), Value::from(name)]
}

/// Inserts rows in one transaction committed under the next commit id.
pub fn insert_committed(
    system: &TableSystem,
    table: &TableSource,
    rows: &[Vec<Value>],
) -> Vec<RowNumber> {
    let mut changes = table.begin_changes();
    let added = rows
        .iter()
        .map(|values| changes.insert_row(table, values).unwrap())
        .collect();
    table.commit(system.next_commit_id(), changes).unwrap();
    added
}
