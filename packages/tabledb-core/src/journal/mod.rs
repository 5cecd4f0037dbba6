//! Per-table event journal behind commit, rollback and merge.
//!
//! A transaction records the rows it adds and removes in an
//! [`EventRegistry`]. Committing seals it into an immutable
//! [`CommittedRegistry`] tagged with the commit id and appends it to the
//! table's [`RegistryChain`]; rolling back simply discards it.

mod chain;
mod event;
mod registry;

pub use chain::RegistryChain;
pub use event::{EventKind, RowEvent};
pub use registry::{CommittedRegistry, EventRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::Arc;

    fn committed(table_id: u32, commit_id: u64, adds: &[usize]) -> CommittedRegistry {
        let mut registry = EventRegistry::new(table_id);
        for row in adds {
            registry.add(*row);
        }
        registry.seal(commit_id)
    }

    #[test]
    fn test_registry_records_events_in_order() {
        let mut registry = EventRegistry::new(3);
        registry.add(4);
        registry.remove(1);
        registry.add(5);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.events(),
            &[
                RowEvent::new(4, EventKind::Add),
                RowEvent::new(1, EventKind::Remove),
                RowEvent::new(5, EventKind::Add),
            ]
        );

        let sealed = registry.seal(10);
        assert_eq!(sealed.commit_id(), 10);
        assert_eq!(sealed.table_id(), 3);
        assert_eq!(sealed.added_rows().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(sealed.removed_rows().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_chain_requires_increasing_commit_ids() {
        let mut chain = RegistryChain::new();
        chain.append(Arc::new(committed(1, 5, &[0]))).unwrap();
        assert!(matches!(
            chain.append(Arc::new(committed(1, 5, &[1]))),
            Err(DbError::Argument(_))
        ));
        assert!(matches!(
            chain.check_next(3),
            Err(DbError::Argument(_))
        ));
        chain.append(Arc::new(committed(1, 9, &[1]))).unwrap();
        assert_eq!(chain.last_commit_id(), Some(9));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_find_changes_since() {
        let mut chain = RegistryChain::new();
        for id in [2, 4, 6] {
            chain.append(Arc::new(committed(1, id, &[id as usize]))).unwrap();
        }
        let ids = |since| {
            chain
                .find_changes_since(since)
                .iter()
                .map(|r| r.commit_id())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(0), vec![2, 4, 6]);
        assert_eq!(ids(2), vec![4, 6]);
        assert_eq!(ids(5), vec![6]);
        assert!(ids(6).is_empty());
    }

    #[test]
    fn test_merge_folds_registries_away() {
        let mut chain = RegistryChain::new();
        for id in [1, 2, 3] {
            chain.append(Arc::new(committed(1, id, &[]))).unwrap();
        }
        let merged = chain.merge_up_to(2);
        assert_eq!(
            merged.iter().map(|r| r.commit_id()).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.merged_up_to(), 2);
        assert!(chain.merge_up_to(2).is_empty());
        // ids at or below the merge point stay unusable
        assert!(chain.check_next(2).is_err());
        assert!(chain.check_next(4).is_ok());
    }
}
