//! Row store.
//!
//! A [`TableSource`] holds one table's rows in a slot directory addressed
//! by [`RowNumber`](crate::RowNumber). Each slot carries a
//! [`RecordState`] that decides whether transactions can see the row:
//! rows are added `Uncommitted`, become `CommittedAdded` on commit,
//! `CommittedRemoved` when a commit removes them (or their adding
//! transaction rolls back), and `Deleted` once hard-removed, at which point
//! the slot joins the delete chain for reuse.

mod changes;
mod collector;
mod info;
mod record;
mod record_state;
mod slot_directory;
mod source;

pub use changes::PendingChanges;
pub use info::{ColumnDef, IndexDef, IndexSetInfo, TableInfo};
pub use record::{decode_record, encode_record};
pub use record_state::RecordState;
pub use slot_directory::{Slot, SlotDirectory};
pub use source::TableSource;

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
