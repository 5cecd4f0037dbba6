//! Table locks coordinating transactions on several threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ntest::timeout;
use tempfile::tempdir;

use tabledb_core::index::{IndexKey, IndexRange};
use tabledb_core::lock::{DatabaseMode, LockMode};
use tabledb_core::DbError;

use super::helpers::{create_t, open_system, row};

#[test]
#[timeout(10000)]
fn test_locked_writers_commit_in_order() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let system = Arc::new(open_system(dir.path()));
    let t = create_t(&system);
    let table_id = t.table_id();

    let workers: Vec<_> = (0..4i64)
        .map(|worker| {
            let system = Arc::clone(&system);
            thread::spawn(move || -> Result<(), DbError> {
                let t = system.table("t")?;
                for i in 0..25 {
                    let op = system.locking().lock_operation(
                        DatabaseMode::Shared,
                        &[table_id],
                        &[],
                    )?;
                    op.check_access(table_id, LockMode::Write)?;
                    let mut txn = t.begin_changes();
                    txn.insert_row(&t, &row(worker * 100 + i, "w"))?;
                    t.commit(system.next_commit_id(), txn)?;
                    op.release();
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked")?;
    }

    assert_eq!(t.row_count(), 100);
    assert_eq!(t.select_range("by_id", &[IndexRange::full()])?.len(), 100);
    assert_eq!(t.select_equal("by_id", IndexKey::single(312i64))?.len(), 1);
    Ok(())
}

#[test]
#[timeout(10000)]
fn test_reader_waits_for_writer() {
    let dir = tempdir().unwrap();
    let system = Arc::new(open_system(dir.path()));
    let t = create_t(&system);
    let table_id = t.table_id();
    let locks = Arc::clone(system.locking());

    let mut writer = locks.lock_tables(&[table_id], &[]);
    writer.acquire().unwrap();
    let mut txn = t.begin_changes();
    txn.insert_row(&t, &row(1, "late")).unwrap();

    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let reader = {
        let locks = Arc::clone(&locks);
        let t = Arc::clone(&t);
        let seen = Arc::clone(&seen);
        thread::spawn(move || {
            let mut handle = locks.lock_tables(&[], &[table_id]);
            handle.acquire().unwrap();
            handle.check_access(table_id, LockMode::Read).unwrap();
            seen.store(t.row_count(), Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(seen.load(Ordering::SeqCst), usize::MAX);

    t.commit(system.next_commit_id(), txn).unwrap();
    writer.release();
    reader.join().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
#[timeout(10000)]
fn test_exclusive_mode_for_schema_changes() {
    let dir = tempdir().unwrap();
    let system = Arc::new(open_system(dir.path()));
    let _t = create_t(&system);

    let shared = system.locking().set_mode(DatabaseMode::Shared).unwrap();
    let dropper = {
        let system = Arc::clone(&system);
        thread::spawn(move || {
            let _exclusive = system.locking().set_mode(DatabaseMode::Exclusive).unwrap();
            system.drop_table("t").unwrap();
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(system.contains_table("t").unwrap());
    drop(shared);
    dropper.join().unwrap();
    assert!(!system.contains_table("t").unwrap());
}
