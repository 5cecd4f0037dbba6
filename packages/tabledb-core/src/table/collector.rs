use std::collections::{BTreeMap, BTreeSet};

use crate::{CommitId, RowNumber};

/// Tracks rows waiting to be hard-removed.
///
/// Rows removed by a commit stay reachable to older snapshots until that
/// commit has been merged; rolled-back rows are eligible right away.
#[derive(Debug, Default)]
pub(crate) struct Collector {
    awaiting_merge: BTreeMap<CommitId, Vec<RowNumber>>,
    eligible: BTreeSet<RowNumber>,
}

impl Collector {
    pub(crate) fn mark_removed(&mut self, commit_id: CommitId, row: RowNumber) {
        self.awaiting_merge.entry(commit_id).or_default().push(row);
    }

    pub(crate) fn mark_eligible(&mut self, row: RowNumber) {
        self.eligible.insert(row);
    }

    /// Makes rows removed by commits up to `commit_id` eligible.
    pub(crate) fn release_merged(&mut self, commit_id: CommitId) {
        let keep = self.awaiting_merge.split_off(&commit_id.saturating_add(1));
        let merged = std::mem::replace(&mut self.awaiting_merge, keep);
        self.eligible.extend(merged.into_values().flatten());
    }

    pub(crate) fn take_eligible(&mut self) -> Vec<RowNumber> {
        std::mem::take(&mut self.eligible).into_iter().collect()
    }

    /// Everything pending, merged or not.
    pub(crate) fn take_all(&mut self) -> Vec<RowNumber> {
        let mut rows: BTreeSet<RowNumber> = std::mem::take(&mut self.eligible);
        rows.extend(std::mem::take(&mut self.awaiting_merge).into_values().flatten());
        rows.into_iter().collect()
    }

    pub(crate) fn forget(&mut self, row: RowNumber) {
        self.eligible.remove(&row);
        for rows in self.awaiting_merge.values_mut() {
            rows.retain(|&r| r != row);
        }
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.eligible.len() + self.awaiting_merge.values().map(Vec::len).sum::<usize>()
    }
}
