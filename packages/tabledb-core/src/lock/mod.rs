//! Table locking mechanism.

mod handle;
mod mechanism;
mod mode;

pub use handle::{HandleState, LockHandle, OperationLock};
pub use mechanism::LockingMechanism;
pub use mode::{DatabaseMode, LockMode, ModeGuard};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use ntest::timeout;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn mechanism() -> Arc<LockingMechanism> {
        Arc::new(LockingMechanism::default())
    }

    #[test]
    fn test_reads_share_a_table() {
        let locks = mechanism();
        let mut r1 = locks.lock_tables(&[], &[1]);
        let mut r2 = locks.lock_tables(&[], &[1]);
        assert!(r1.try_acquire().unwrap());
        assert!(r2.try_acquire().unwrap());
        assert_eq!(locks.queue_len(1), 2);
    }

    #[test]
    fn test_read_waits_for_earlier_write() {
        let locks = mechanism();
        let mut w1 = locks.lock_tables(&[1], &[]);
        let mut r1 = locks.lock_tables(&[], &[1]);
        assert!(w1.try_acquire().unwrap());
        assert!(!r1.try_acquire().unwrap());
        assert_eq!(r1.state(), HandleState::Unacquired);

        w1.release();
        assert!(r1.try_acquire().unwrap());
        assert_eq!(r1.state(), HandleState::Acquired);
    }

    #[test]
    fn test_write_waits_for_earlier_write() {
        let locks = mechanism();
        let mut w1 = locks.lock_tables(&[1], &[]);
        let mut w2 = locks.lock_tables(&[1], &[]);
        assert!(!w2.try_acquire().unwrap());
        assert!(w1.try_acquire().unwrap());
        assert!(!w2.try_acquire().unwrap());
        drop(w1);
        assert!(w2.try_acquire().unwrap());
    }

    #[test]
    fn test_write_waits_for_earlier_read() {
        let locks = mechanism();
        let mut r1 = locks.lock_tables(&[], &[1]);
        let mut w1 = locks.lock_tables(&[1], &[]);
        let mut r2 = locks.lock_tables(&[], &[1]);
        assert!(r1.try_acquire().unwrap());
        assert!(!w1.try_acquire().unwrap());
        assert!(!r2.try_acquire().unwrap());
        r1.release();
        assert!(w1.try_acquire().unwrap());
        assert!(!r2.try_acquire().unwrap());
    }

    #[test]
    fn test_unrelated_tables_do_not_block() {
        let locks = mechanism();
        let mut w1 = locks.lock_tables(&[1], &[]);
        let mut w2 = locks.lock_tables(&[2], &[]);
        assert!(w1.try_acquire().unwrap());
        assert!(w2.try_acquire().unwrap());
    }

    #[test]
    fn test_write_set_wins_over_read_set() {
        let locks = mechanism();
        let handle = locks.lock_tables(&[3, 1, 3], &[2, 1]);
        assert_eq!(handle.write_tables(), &[1, 3]);
        assert_eq!(handle.read_tables(), &[2]);
        assert_eq!(locks.queue_len(1), 1);
    }

    #[test]
    #[timeout(5000)]
    fn test_blocked_read_resumes_after_release() {
        let locks = mechanism();
        let mut w1 = locks.lock_tables(&[7], &[]);
        w1.acquire().unwrap();
        let mut r1 = locks.lock_tables(&[], &[7]);

        let proceeded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&proceeded);
        let reader = thread::spawn(move || {
            r1.acquire().unwrap();
            flag.store(true, Ordering::SeqCst);
            r1
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!proceeded.load(Ordering::SeqCst));
        w1.release();

        let r1 = reader.join().unwrap();
        assert!(proceeded.load(Ordering::SeqCst));
        assert_eq!(r1.state(), HandleState::Acquired);
    }

    #[test]
    #[timeout(5000)]
    fn test_acquire_times_out() {
        let locks = Arc::new(LockingMechanism::new(Some(Duration::from_millis(20))));
        let mut w1 = locks.lock_tables(&[1], &[]);
        w1.acquire().unwrap();
        let mut w2 = locks.lock_tables(&[1], &[]);
        assert!(matches!(w2.acquire(), Err(DbError::Timeout(_))));
        drop(w2);
        assert_eq!(locks.queue_len(1), 1);
    }

    #[test]
    fn test_check_access() {
        let locks = mechanism();
        let mut handle = locks.lock_tables(&[1], &[2]);
        assert!(matches!(
            handle.check_access(1, LockMode::Write),
            Err(DbError::Argument(_))
        ));
        handle.acquire().unwrap();

        assert!(handle.check_access(1, LockMode::Write).is_ok());
        assert!(handle.check_access(1, LockMode::Read).is_ok());
        assert!(handle.check_access(2, LockMode::Read).is_ok());
        assert!(matches!(
            handle.check_access(2, LockMode::Write),
            Err(DbError::LockOrder { table_id: 2, mode: "write" })
        ));
        assert!(matches!(
            handle.check_access(9, LockMode::Read),
            Err(DbError::LockOrder { table_id: 9, .. })
        ));
    }

    #[test]
    fn test_release_twice_is_a_no_op() {
        let locks = mechanism();
        let mut handle = locks.lock_tables(&[1], &[]);
        handle.acquire().unwrap();
        handle.release();
        handle.release();
        assert_eq!(handle.state(), HandleState::Released);
        assert_eq!(locks.queue_len(1), 0);
        assert!(handle.acquire().is_err());
    }

    #[test]
    fn test_unacquired_handle_releases_on_drop() {
        let locks = mechanism();
        let mut w1 = locks.lock_tables(&[1], &[]);
        w1.acquire().unwrap();
        {
            let _queued = locks.lock_tables(&[1], &[]);
            assert_eq!(locks.queue_len(1), 2);
        }
        assert_eq!(locks.queue_len(1), 1);
    }

    #[test]
    #[timeout(5000)]
    fn test_exclusive_waits_for_shared_users() {
        let locks = mechanism();
        let shared = locks.set_mode(DatabaseMode::Shared).unwrap();
        assert_eq!(locks.shared_users(), 1);

        let entered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&entered);
        let waiter = Arc::clone(&locks);
        let exclusive = thread::spawn(move || {
            let guard = waiter.set_mode(DatabaseMode::Exclusive).unwrap();
            flag.store(true, Ordering::SeqCst);
            drop(guard);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        drop(shared);
        exclusive.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
        assert!(!locks.is_exclusive());
    }

    #[test]
    fn test_exclusive_keeps_shared_out() {
        let locks = Arc::new(LockingMechanism::new(Some(Duration::from_millis(20))));
        let mut exclusive = locks.set_mode(DatabaseMode::Exclusive).unwrap();
        assert!(locks.is_exclusive());
        assert!(matches!(
            locks.set_mode(DatabaseMode::Shared),
            Err(DbError::Timeout(_))
        ));
        exclusive.release();
        exclusive.release();
        let shared = locks.set_mode(DatabaseMode::Shared).unwrap();
        assert_eq!(shared.mode(), DatabaseMode::Shared);
    }

    #[test]
    fn test_lock_operation_takes_mode_then_tables() {
        let locks = mechanism();
        let op = locks
            .lock_operation(DatabaseMode::Shared, &[4], &[5])
            .unwrap();
        assert_eq!(locks.shared_users(), 1);
        assert!(op.check_access(4, LockMode::Write).is_ok());
        assert!(op.check_access(5, LockMode::Read).is_ok());
        assert_eq!(op.handle().state(), HandleState::Acquired);

        op.release();
        assert_eq!(locks.shared_users(), 0);
        assert_eq!(locks.queue_len(4), 0);
    }
}
