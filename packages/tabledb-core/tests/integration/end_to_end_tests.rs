//! End-to-end transaction flows through the table system.

use tempfile::tempdir;

use tabledb_core::index::{IndexKey, IndexRange};
use tabledb_core::journal::EventKind;
use tabledb_core::table::RecordState;
use tabledb_core::types::Value;

use super::helpers::{create_t, insert_committed, open_system, row};

#[test]
fn test_commit_then_rollback_scenario() {
    let dir = tempdir().unwrap();
    let system = open_system(dir.path());
    let t = create_t(&system);

    // txn A
    let mut a = t.begin_changes();
    let r0 = a.insert_row(&t, &row(1, "x")).unwrap();
    t.commit(5, a).unwrap();
    assert_eq!(r0, 0);

    let changes = t.find_changes_since(4);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].commit_id(), 5);
    let events = changes[0].events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].row, 0);
    assert_eq!(events[0].kind, EventKind::Add);

    // txn B
    let mut b = t.begin_changes();
    b.remove_row(&t, 0).unwrap();
    assert!(b.rows().is_empty());
    t.rollback(b).unwrap();

    assert_eq!(t.read_state(0).unwrap(), RecordState::CommittedAdded);
    assert_eq!(t.committed_rows(), vec![0]);
    assert_eq!(t.find_changes_since(5).len(), 0);
}

#[test]
fn test_rolled_back_rows_are_never_visible() {
    let dir = tempdir().unwrap();
    let system = open_system(dir.path());
    let t = create_t(&system);
    insert_committed(&system, &t, &[row(1, "a")]);
    let before = system.last_commit_id();

    let mut txn = t.begin_changes();
    let ghost = txn.insert_row(&t, &row(2, "b")).unwrap();
    t.rollback(txn).unwrap();

    assert!(t.find_changes_since(before).is_empty());
    assert_eq!(
        t.select_range("by_id", &[IndexRange::full()]).unwrap(),
        vec![0]
    );
    assert!(!t.committed_indexes().contains(ghost));
    assert_eq!(t.read_state(ghost).unwrap(), RecordState::CommittedRemoved);
}

#[test]
fn test_merge_reclaims_removed_rows() {
    let dir = tempdir().unwrap();
    let system = open_system(dir.path());
    let t = create_t(&system);
    insert_committed(&system, &t, &[row(1, "a"), row(2, "b"), row(3, "c")]);

    let mut txn = t.begin_changes();
    txn.remove_row(&t, 1).unwrap();
    let removed_at = system.next_commit_id();
    t.commit(removed_at, txn).unwrap();
    assert_eq!(t.read_state(1).unwrap(), RecordState::CommittedRemoved);

    assert_eq!(system.merge_changes(removed_at).unwrap(), 2);
    assert_eq!(t.read_state(1).unwrap(), RecordState::Deleted);

    let reused = insert_committed(&system, &t, &[row(4, "d")]);
    assert_eq!(reused, vec![1]);
    assert_eq!(t.get_row(1).unwrap(), row(4, "d"));
}

#[test]
fn test_index_queries_over_committed_rows() {
    let dir = tempdir().unwrap();
    let system = open_system(dir.path());
    let t = create_t(&system);
    insert_committed(
        &system,
        &t,
        &[row(30, "c"), row(10, "a"), row(20, "b"), row(40, "a")],
    );

    let by_id = t
        .select_range(
            "by_id",
            &[IndexRange::between(IndexKey::single(15i64), IndexKey::single(35i64))],
        )
        .unwrap();
    assert_eq!(by_id, vec![2, 0]);

    let mut by_name = t.select_equal("by_name", IndexKey::single("a")).unwrap();
    by_name.sort_unstable();
    assert_eq!(by_name, vec![1, 3]);

    let snapshot = t.committed_indexes();
    let index = snapshot.index_named("by_id").unwrap();
    assert_eq!(
        index
            .select_greater(t.as_ref(), &IndexKey::single(20i64))
            .unwrap(),
        vec![0, 3]
    );
    assert_eq!(
        index
            .select_less_or_equal(t.as_ref(), &IndexKey::single(Value::Integer(10)))
            .unwrap(),
        vec![1]
    );
}

#[test]
fn test_overlapping_ranges_repeat_rows() {
    let dir = tempdir().unwrap();
    let system = open_system(dir.path());
    let t = create_t(&system);
    insert_committed(&system, &t, &[row(1, "a"), row(2, "b"), row(3, "c")]);

    // union of overlapping ranges keeps duplicates
    let rows = t
        .select_range(
            "by_id",
            &[
                IndexRange::less_or_equal(IndexKey::single(2i64)),
                IndexRange::greater_or_equal(IndexKey::single(2i64)),
            ],
        )
        .unwrap();
    assert_eq!(rows, vec![0, 1, 1, 2]);
}

#[test]
fn test_interleaved_transactions_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let system = open_system(dir.path());
        let t = create_t(&system);

        let mut a = t.begin_changes();
        let mut b = t.begin_changes();
        a.insert_row(&t, &row(1, "ann")).unwrap();
        b.insert_row(&t, &row(2, "bob")).unwrap();
        t.commit(system.next_commit_id(), a).unwrap();
        t.commit(system.next_commit_id(), b).unwrap();

        assert_eq!(t.committed_rows(), vec![0, 1]);
        assert_eq!(t.read_state(0).unwrap(), RecordState::CommittedAdded);
        assert_eq!(t.find_changes_since(0).len(), 2);
        system.close().unwrap();
    }

    let system = open_system(dir.path());
    let t = system.table("t").unwrap();
    assert_eq!(t.committed_rows(), vec![0, 1]);
    assert_eq!(
        t.select_range("by_id", &[IndexRange::full()]).unwrap(),
        vec![0, 1]
    );
    assert_eq!(
        t.select_equal("by_name", IndexKey::single("ann")).unwrap(),
        vec![0]
    );
}
