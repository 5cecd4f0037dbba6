use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::DbError;
use crate::CommitId;

use super::registry::CommittedRegistry;

/// Append-only log of a table's committed registries, keyed by commit id.
///
/// Entries are shared immutably; merging removes every entry at or below
/// the merge point.
#[derive(Debug, Default)]
pub struct RegistryChain {
    entries: BTreeMap<CommitId, Arc<CommittedRegistry>>,
    last_commit_id: Option<CommitId>,
    merged_up_to: CommitId,
}

impl RegistryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that `commit_id` may be appended next.
    pub fn check_next(&self, commit_id: CommitId) -> Result<(), DbError> {
        let floor = self.last_commit_id.unwrap_or(0).max(self.merged_up_to);
        if commit_id <= floor {
            return Err(DbError::Argument(format!(
                "commit id {} is not above the last commit id {}",
                commit_id, floor
            )));
        }
        Ok(())
    }

    pub fn append(&mut self, registry: Arc<CommittedRegistry>) -> Result<(), DbError> {
        let commit_id = registry.commit_id();
        self.check_next(commit_id)?;
        self.entries.insert(commit_id, registry);
        self.last_commit_id = Some(commit_id);
        Ok(())
    }

    /// Every registry committed after `commit_id`, in commit order.
    pub fn find_changes_since(&self, commit_id: CommitId) -> Vec<Arc<CommittedRegistry>> {
        self.entries
            .range((Bound::Excluded(commit_id), Bound::Unbounded))
            .map(|(_, r)| Arc::clone(r))
            .collect()
    }

    /// Removes and returns every registry with a commit id up to `commit_id`.
    pub fn merge_up_to(&mut self, commit_id: CommitId) -> Vec<Arc<CommittedRegistry>> {
        let keep = self.entries.split_off(&(commit_id.saturating_add(1)));
        let merged = std::mem::replace(&mut self.entries, keep);
        self.merged_up_to = self.merged_up_to.max(commit_id);
        merged.into_values().collect()
    }

    pub fn last_commit_id(&self) -> Option<CommitId> {
        self.last_commit_id
    }

    pub fn merged_up_to(&self) -> CommitId {
        self.merged_up_to
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restores the commit watermark of a reopened table.
    pub(crate) fn restore_watermark(&mut self, last_commit_id: CommitId) {
        self.merged_up_to = self.merged_up_to.max(last_commit_id);
    }
}
