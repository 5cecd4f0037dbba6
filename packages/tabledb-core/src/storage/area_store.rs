//! Heap of variable-length areas backing one table or the blob store.

use crate::error::DbError;

use super::bytes::{ByteReader, ByteWriter};

/// Address of an area within an [`AreaStore`].
pub type AreaId = i64;

/// The fixed area every store reserves for its header.
pub const HEADER_AREA: AreaId = 0;

const IMAGE_MAGIC: u32 = 0x5444_4253;
const IMAGE_VERSION: u32 = 1;

/// Heap of variable-length areas addressed by [`AreaId`].
///
/// Freed ids go on a free list and are handed out again before the heap
/// grows. Area [`HEADER_AREA`] always exists and can never be freed.
#[derive(Debug, Clone)]
pub struct AreaStore {
    areas: Vec<Option<Vec<u8>>>,
    free: Vec<AreaId>,
}

impl AreaStore {
    /// Creates a store holding only an empty header area.
    pub fn new() -> Self {
        Self {
            areas: vec![Some(Vec::new())],
            free: Vec::new(),
        }
    }

    fn slot(&self, id: AreaId) -> Result<&Vec<u8>, DbError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.areas.get(i))
            .and_then(|a| a.as_ref())
            .ok_or_else(|| DbError::DataCorruption(format!("area {} does not exist", id)))
    }

    fn slot_mut(&mut self, id: AreaId) -> Result<&mut Option<Vec<u8>>, DbError> {
        let slot = usize::try_from(id)
            .ok()
            .and_then(|i| self.areas.get_mut(i))
            .ok_or_else(|| DbError::DataCorruption(format!("area {} does not exist", id)))?;
        if slot.is_none() {
            return Err(DbError::DataCorruption(format!("area {} was freed", id)));
        }
        Ok(slot)
    }

    /// Allocates a new area holding `data` and returns its id.
    pub fn allocate(&mut self, data: Vec<u8>) -> AreaId {
        if let Some(id) = self.free.pop() {
            self.areas[id as usize] = Some(data);
            return id;
        }
        self.areas.push(Some(data));
        (self.areas.len() - 1) as AreaId
    }

    /// Returns the contents of an area.
    pub fn read(&self, id: AreaId) -> Result<&[u8], DbError> {
        self.slot(id).map(|a| a.as_slice())
    }

    /// Replaces the contents of an existing area.
    pub fn write(&mut self, id: AreaId, data: Vec<u8>) -> Result<(), DbError> {
        *self.slot_mut(id)? = Some(data);
        Ok(())
    }

    /// Frees an area, making its id available for reuse.
    pub fn free(&mut self, id: AreaId) -> Result<(), DbError> {
        if id == HEADER_AREA {
            return Err(DbError::Argument("the header area cannot be freed".into()));
        }
        *self.slot_mut(id)? = None;
        self.free.push(id);
        Ok(())
    }

    /// Number of areas currently allocated, header included.
    pub fn live_area_count(&self) -> usize {
        self.areas.iter().filter(|a| a.is_some()).count()
    }

    /// Ids of every live area except the header, ascending.
    pub fn area_ids(&self) -> impl Iterator<Item = AreaId> + '_ {
        self.areas
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, a)| a.is_some())
            .map(|(i, _)| i as AreaId)
    }

    /// Total bytes held by live areas.
    pub fn live_bytes(&self) -> usize {
        self.areas.iter().flatten().map(Vec::len).sum()
    }

    /// Encodes the store into a file image body (checksum excluded).
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(self.live_bytes() + 32);
        w.put_u32(IMAGE_MAGIC)
            .put_u32(IMAGE_VERSION)
            .put_u64(self.areas.len() as u64)
            .put_u64(self.free.len() as u64);
        for id in &self.free {
            w.put_i64(*id);
        }
        for area in &self.areas {
            match area {
                Some(data) => {
                    w.put_u8(1).put_u32(data.len() as u32).put_bytes(data);
                }
                None => {
                    w.put_u8(0);
                }
            }
        }
        w.into_inner()
    }

    /// Decodes a file image body produced by [`AreaStore::encode`].
    pub fn decode(image: &[u8]) -> Result<Self, DbError> {
        let mut r = ByteReader::new(image);
        let magic = r.u32()?;
        if magic != IMAGE_MAGIC {
            return Err(DbError::DataCorruption(format!(
                "bad store magic {:#x}",
                magic
            )));
        }
        let version = r.u32()?;
        if version != IMAGE_VERSION {
            return Err(DbError::DataCorruption(format!(
                "unsupported store version {}",
                version
            )));
        }
        let area_count = r.u64()? as usize;
        let free_count = r.u64()? as usize;
        // every entry needs at least one byte, so bound allocations by what is left
        if free_count.saturating_mul(8) > r.remaining() || area_count > r.remaining() {
            return Err(DbError::DataCorruption("store counts exceed image".into()));
        }
        let mut free = Vec::with_capacity(free_count);
        for _ in 0..free_count {
            free.push(r.i64()?);
        }
        let mut areas = Vec::with_capacity(area_count);
        for _ in 0..area_count {
            match r.u8()? {
                0 => areas.push(None),
                1 => {
                    let len = r.u32()? as usize;
                    areas.push(Some(r.bytes(len)?.to_vec()));
                }
                other => {
                    return Err(DbError::DataCorruption(format!(
                        "bad area presence flag {}",
                        other
                    )))
                }
            }
        }
        if areas.first().map_or(true, Option::is_none) {
            return Err(DbError::DataCorruption("store has no header area".into()));
        }
        for id in &free {
            let vacant = usize::try_from(*id)
                .ok()
                .and_then(|i| areas.get(i))
                .is_some_and(Option::is_none);
            if !vacant {
                return Err(DbError::DataCorruption(format!(
                    "free list names live area {}",
                    id
                )));
            }
        }
        Ok(Self { areas, free })
    }
}

impl Default for AreaStore {
    fn default() -> Self {
        Self::new()
    }
}
