//! Physical record layout.
//!
//! ```text
//! reserved: i32
//! per column: tag: i32, offset: i32   (offset into the data section)
//! data section
//! ```
//!
//! Tag 0 is a null cell, 1 an inline value and 2 a large-object reference
//! stored as `kind: i32, reserved: i32, id: i64`.

use crate::error::DbError;
use crate::storage::{ByteReader, ByteWriter};
use crate::types::{decode_value, encode_value, LobKind, LobRef, Value};

const TAG_NULL: i32 = 0;
const TAG_INLINE: i32 = 1;
const TAG_LOB: i32 = 2;

const CELL_HEADER_SIZE: usize = 8;

fn data_start(column_count: usize) -> usize {
    4 + column_count * CELL_HEADER_SIZE
}

/// Encodes a row into its record bytes.
pub fn encode_record(values: &[Value]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut w = ByteWriter::with_capacity(data_start(values.len()));
    w.put_i32(0);
    for value in values {
        let offset = data.len() as i32;
        match value {
            Value::Null => {
                w.put_i32(TAG_NULL).put_i32(0);
            }
            Value::LargeObject(lob) => {
                w.put_i32(TAG_LOB).put_i32(offset);
                data.extend_from_slice(&lob.kind.code().to_le_bytes());
                data.extend_from_slice(&0i32.to_le_bytes());
                data.extend_from_slice(&lob.id.to_le_bytes());
            }
            inline => {
                w.put_i32(TAG_INLINE).put_i32(offset);
                encode_value(inline, &mut data);
            }
        }
    }
    w.put_bytes(&data);
    w.into_inner()
}

/// Decodes a single cell without touching the others.
pub fn decode_cell(record: &[u8], column: usize, column_count: usize) -> Result<Value, DbError> {
    if column >= column_count {
        return Err(DbError::Argument(format!(
            "column {} out of range for {} columns",
            column, column_count
        )));
    }
    let mut header = ByteReader::at(record, 4 + column * CELL_HEADER_SIZE)?;
    let tag = header.i32()?;
    let offset = header.i32()?;
    if tag == TAG_NULL {
        return Ok(Value::Null);
    }
    let offset = usize::try_from(offset)
        .map_err(|_| DbError::DataCorruption(format!("negative cell offset {}", offset)))?;
    let mut cell = ByteReader::at(record, data_start(column_count) + offset)?;
    match tag {
        TAG_INLINE => {
            let (value, _) = decode_value(cell.bytes(cell.remaining())?)?;
            Ok(value)
        }
        TAG_LOB => {
            let code = cell.i32()?;
            let _reserved = cell.i32()?;
            let id = cell.i64()?;
            let kind = LobKind::from_code(code).ok_or_else(|| {
                DbError::DataCorruption(format!("unknown large object kind {}", code))
            })?;
            Ok(Value::LargeObject(LobRef { kind, id }))
        }
        other => Err(DbError::DataCorruption(format!("unknown cell tag {}", other))),
    }
}

pub fn decode_record(record: &[u8], column_count: usize) -> Result<Vec<Value>, DbError> {
    (0..column_count)
        .map(|column| decode_cell(record, column, column_count))
        .collect()
}

/// Large-object references held by a record.
pub fn lob_refs(record: &[u8], column_count: usize) -> Result<Vec<LobRef>, DbError> {
    Ok(decode_record(record, column_count)?
        .iter()
        .filter_map(Value::lob_ref)
        .collect())
}
