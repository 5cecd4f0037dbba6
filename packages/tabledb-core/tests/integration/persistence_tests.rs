//! Reopening databases, crash leftovers and damaged files.

use std::fs;
use std::mem;

use tempfile::tempdir;

use tabledb_core::index::IndexKey;
use tabledb_core::table::RecordState;
use tabledb_core::types::{LobKind, Value};
use tabledb_core::{DbError, TableSystem};

use super::helpers::{config, create_docs, create_t, insert_committed, open_system, row};

#[test]
fn test_rows_and_indexes_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let system = open_system(dir.path());
        let t = create_t(&system);
        insert_committed(&system, &t, &[row(1, "ann"), row(2, "bob")]);
        assert_eq!(t.next_sequence_id().unwrap(), 1);
        system.close().unwrap();
    }

    let system = open_system(dir.path());
    let t = system.table("t").unwrap();
    assert_eq!(t.committed_rows(), vec![0, 1]);
    assert_eq!(t.get_row(1).unwrap(), row(2, "bob"));
    assert_eq!(
        t.select_equal("by_name", IndexKey::single("ann")).unwrap(),
        vec![0]
    );
    assert_eq!(t.next_sequence_id().unwrap(), 2);
    assert_eq!(system.last_commit_id(), 1);
}

#[test]
fn test_unclean_shutdown_discards_uncommitted_rows() {
    let dir = tempdir().unwrap();
    {
        let system = open_system(dir.path());
        let t = create_t(&system);
        insert_committed(&system, &t, &[row(1, "kept")]);
        let mut txn = t.begin_changes();
        txn.insert_row(&t, &row(2, "lost")).unwrap();
        t.flush().unwrap();
        // no close
    }

    let system = open_system(dir.path());
    let t = system.table("t").unwrap();
    assert_eq!(t.committed_rows(), vec![0]);
    assert_eq!(t.read_state(1).unwrap(), RecordState::Deleted);
    assert!(t
        .select_equal("by_name", IndexKey::single("lost"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_damaged_table_file_is_detected() {
    let dir = tempdir().unwrap();
    let file = {
        let system = open_system(dir.path());
        let t = create_t(&system);
        insert_committed(&system, &t, &[row(1, "ann")]);
        system.close().unwrap();
        t.path().to_path_buf()
    };

    let mut bytes = fs::read(&file).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xFF;
    fs::write(&file, bytes).unwrap();

    assert!(matches!(
        TableSystem::open(config(dir.path())),
        Err(DbError::DataCorruption(_))
    ));
}

#[test]
fn test_large_objects_survive_reopen() {
    let dir = tempdir().unwrap();
    let lob = {
        let system = open_system(dir.path());
        let docs = create_docs(&system);
        let lob = system.blobs().allocate(LobKind::Binary, &[1, 2, 3]);
        insert_committed(
            &system,
            &docs,
            &[vec![Value::Integer(1), Value::Null, Value::LargeObject(lob)]],
        );
        system.close().unwrap();
        lob
    };

    let system = open_system(dir.path());
    let docs = system.table("docs").unwrap();
    assert_eq!(docs.get_cell(2, 0).unwrap(), Value::LargeObject(lob));
    assert_eq!(system.blobs().read(lob).unwrap(), vec![1, 2, 3]);
    assert_eq!(system.blobs().reference_count(lob).unwrap(), 1);
}

#[test]
fn test_commit_ids_survive_unclean_shutdown() {
    let dir = tempdir().unwrap();
    {
        let system = open_system(dir.path());
        let t = create_t(&system);
        insert_committed(&system, &t, &[row(1, "ann")]);
        insert_committed(&system, &t, &[row(2, "bob")]);
        assert_eq!(system.last_commit_id(), 2);
        mem::forget(system);
    }

    let system = open_system(dir.path());
    assert_eq!(system.last_commit_id(), 2);
    let t = system.table("t").unwrap();
    assert_eq!(t.commit_watermark(), 2);

    let mut changes = t.begin_changes();
    changes.insert_row(&t, &row(3, "cy")).unwrap();
    assert!(matches!(t.commit(2, changes.clone()), Err(DbError::Argument(_))));
    let next = system.next_commit_id();
    assert_eq!(next, 3);
    t.commit(next, changes).unwrap();
    assert_eq!(t.find_changes_since(2).len(), 1);
}

#[test]
fn test_committed_large_objects_survive_unclean_shutdown() {
    let dir = tempdir().unwrap();
    let (kept, orphan) = {
        let system = open_system(dir.path());
        let docs = create_docs(&system);
        let kept = system.blobs().allocate(LobKind::Binary, &[4, 5, 6]);
        let orphan = system.blobs().allocate(LobKind::Text, b"never stored");
        insert_committed(
            &system,
            &docs,
            &[vec![Value::Integer(1), Value::Null, Value::LargeObject(kept)]],
        );
        mem::forget(system);
        (kept, orphan)
    };

    let system = open_system(dir.path());
    let docs = system.table("docs").unwrap();
    assert_eq!(docs.get_cell(2, 0).unwrap(), Value::LargeObject(kept));
    assert_eq!(system.blobs().read(kept).unwrap(), vec![4, 5, 6]);
    assert_eq!(system.blobs().reference_count(kept).unwrap(), 1);
    assert!(system.blobs().read(orphan).is_err());
    assert_eq!(system.blobs().object_count(), 1);
}
