//! Fixed header stored in area 0 of every table's backing store.

use crate::error::DbError;
use crate::{CommitId, TableId};

use super::area_store::AreaId;
use super::bytes::{ByteReader, ByteWriter};

const HEADER_MAGIC: i32 = 0x0AD4_3C91;

/// Current version tag written to table headers.
pub const TABLE_FORMAT_VERSION: i32 = 1;

/// Table header: version, identity, sequence counter, the last commit id
/// applied to the table, and the pointers to every dependent area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub version: i32,
    pub table_id: TableId,
    pub sequence_id: i64,
    pub last_commit_id: CommitId,
    pub schema_area: AreaId,
    pub index_info_area: AreaId,
    pub index_store_area: AreaId,
    pub slot_dir_area: AreaId,
}

impl Default for TableHeader {
    fn default() -> Self {
        Self {
            version: TABLE_FORMAT_VERSION,
            table_id: 0,
            sequence_id: 1,
            last_commit_id: 0,
            schema_area: -1,
            index_info_area: -1,
            index_store_area: -1,
            slot_dir_area: -1,
        }
    }
}

impl TableHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(60);
        w.put_i32(HEADER_MAGIC)
            .put_i32(self.version)
            .put_u32(self.table_id)
            .put_i64(self.sequence_id)
            .put_u64(self.last_commit_id)
            .put_i64(self.schema_area)
            .put_i64(self.index_info_area)
            .put_i64(self.index_store_area)
            .put_i64(self.slot_dir_area);
        w.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DbError> {
        let mut r = ByteReader::new(bytes);
        let magic = r.i32()?;
        if magic != HEADER_MAGIC {
            return Err(DbError::DataCorruption(format!(
                "bad table header magic {:#x}",
                magic
            )));
        }
        let version = r.i32()?;
        if version != TABLE_FORMAT_VERSION {
            return Err(DbError::DataCorruption(format!(
                "unsupported table format version {}",
                version
            )));
        }
        Ok(Self {
            version,
            table_id: r.u32()?,
            sequence_id: r.i64()?,
            last_commit_id: r.u64()?,
            schema_area: r.i64()?,
            index_info_area: r.i64()?,
            index_store_area: r.i64()?,
            slot_dir_area: r.i64()?,
        })
    }
}
