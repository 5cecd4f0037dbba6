//! Slot directory: one entry per row number, plus the delete chain.

use crate::error::DbError;
use crate::storage::{AreaId, ByteReader, ByteWriter};
use crate::RowNumber;

use super::record_state::RecordState;

const NO_SLOT: i64 = -1;
const SLOT_ENTRY_SIZE: usize = 12;

/// One slot: the row's state plus either its record area or, once deleted,
/// the next slot in the delete chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub state: RecordState,
    pub pointer: i64,
}

/// Row-number-indexed table of slots.
///
/// Deleted slots form a singly-linked LIFO free list through their pointer
/// field. A row number is handed out again only after it went through
/// [`SlotDirectory::release`].
#[derive(Debug, Clone)]
pub struct SlotDirectory {
    slots: Vec<Slot>,
    chain_head: i64,
}

impl SlotDirectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            chain_head: NO_SLOT,
        }
    }

    /// Number of slots ever allocated, deleted ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, row: RowNumber) -> Option<Slot> {
        self.slots.get(row).copied()
    }

    /// Overwrites the state of a slot, returning the previous one.
    pub fn set_state(&mut self, row: RowNumber, state: RecordState) -> Option<RecordState> {
        self.slots
            .get_mut(row)
            .map(|slot| std::mem::replace(&mut slot.state, state))
    }

    /// Places a new uncommitted record, reusing the head of the delete
    /// chain when there is one.
    pub fn allocate(&mut self, record: AreaId) -> Result<RowNumber, DbError> {
        let slot = Slot {
            state: RecordState::Uncommitted,
            pointer: record,
        };
        if self.chain_head == NO_SLOT {
            self.slots.push(slot);
            return Ok(self.slots.len() - 1);
        }

        let row = self.chain_position(self.chain_head)?;
        let entry = &mut self.slots[row];
        if entry.state != RecordState::Deleted {
            return Err(DbError::DataCorruption(format!(
                "delete chain head {} is not a deleted slot",
                row
            )));
        }
        self.chain_head = entry.pointer;
        *entry = slot;
        Ok(row)
    }

    /// Marks a slot deleted and pushes it onto the delete chain.
    pub fn release(&mut self, row: RowNumber) -> Result<(), DbError> {
        let head = self.chain_head;
        let entry = self
            .slots
            .get_mut(row)
            .ok_or_else(|| DbError::Argument(format!("slot {} does not exist", row)))?;
        if entry.state == RecordState::Deleted {
            return Err(DbError::Argument(format!("slot {} is already deleted", row)));
        }
        *entry = Slot {
            state: RecordState::Deleted,
            pointer: head,
        };
        self.chain_head = row as i64;
        Ok(())
    }

    /// The slot the next allocation will reuse, if any.
    pub fn chain_head(&self) -> Option<RowNumber> {
        usize::try_from(self.chain_head).ok()
    }

    /// Number of slots waiting on the delete chain.
    pub fn free_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state == RecordState::Deleted)
            .count()
    }

    /// Every slot still holding a record, with its state.
    pub fn live_rows(&self) -> impl Iterator<Item = (RowNumber, Slot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state.is_live())
            .map(|(row, s)| (row, *s))
    }

    fn chain_position(&self, pointer: i64) -> Result<RowNumber, DbError> {
        usize::try_from(pointer)
            .ok()
            .filter(|&p| p < self.slots.len())
            .ok_or_else(|| {
                DbError::DataCorruption(format!("delete chain points outside directory: {}", pointer))
            })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(16 + self.slots.len() * SLOT_ENTRY_SIZE);
        w.put_i64(self.slots.len() as i64).put_i64(self.chain_head);
        for slot in &self.slots {
            w.put_i32(slot.state.code()).put_i64(slot.pointer);
        }
        w.into_inner()
    }

    /// Decodes a directory and verifies its delete chain.
    pub fn decode(bytes: &[u8]) -> Result<Self, DbError> {
        let mut r = ByteReader::new(bytes);
        let count = r.i64()?;
        let chain_head = r.i64()?;
        let count = usize::try_from(count)
            .ok()
            .filter(|&c| c.saturating_mul(SLOT_ENTRY_SIZE) <= r.remaining())
            .ok_or_else(|| DbError::DataCorruption(format!("bad slot count {}", count)))?;

        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            let state = RecordState::from_code(r.i32()?)?;
            let pointer = r.i64()?;
            slots.push(Slot { state, pointer });
        }

        let dir = Self { slots, chain_head };
        dir.verify_chain()?;
        Ok(dir)
    }

    fn verify_chain(&self) -> Result<(), DbError> {
        let mut visited = 0usize;
        let mut cursor = self.chain_head;
        while cursor != NO_SLOT {
            let row = self.chain_position(cursor)?;
            let slot = self.slots[row];
            if slot.state != RecordState::Deleted {
                return Err(DbError::DataCorruption(format!(
                    "delete chain passes through live slot {}",
                    row
                )));
            }
            visited += 1;
            if visited > self.slots.len() {
                return Err(DbError::DataCorruption("delete chain has a cycle".into()));
            }
            cursor = slot.pointer;
        }
        if visited != self.free_count() {
            return Err(DbError::DataCorruption(format!(
                "delete chain holds {} slots but {} are deleted",
                visited,
                self.free_count()
            )));
        }
        Ok(())
    }
}
