//! Inline encoding of cell values inside a record's data section.

use crate::error::DbError;
use crate::storage::ByteReader;

use super::value::Value;

const KIND_BOOLEAN: u8 = 1;
const KIND_INTEGER: u8 = 2;
const KIND_FLOAT: u8 = 3;
const KIND_TEXT: u8 = 4;

/// Appends the inline encoding of `value` to `dst`.
///
/// `Null` and large-object references are not inline values; they are
/// described by the record's cell tag instead and encode to nothing.
pub fn encode_value(value: &Value, dst: &mut Vec<u8>) {
    match value {
        Value::Null | Value::LargeObject(_) => {}
        Value::Boolean(b) => {
            dst.push(KIND_BOOLEAN);
            dst.push(u8::from(*b));
        }
        Value::Integer(i) => {
            dst.push(KIND_INTEGER);
            dst.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            dst.push(KIND_FLOAT);
            dst.extend_from_slice(&f.to_le_bytes());
        }
        Value::Text(s) => {
            dst.push(KIND_TEXT);
            dst.extend_from_slice(&(s.len() as u32).to_le_bytes());
            dst.extend_from_slice(s.as_bytes());
        }
    }
}

/// Decodes one inline value, returning it with the number of bytes consumed.
pub fn decode_value(src: &[u8]) -> Result<(Value, usize), DbError> {
    let mut reader = ByteReader::new(src);
    let value = match reader.u8()? {
        KIND_BOOLEAN => Value::Boolean(reader.u8()? != 0),
        KIND_INTEGER => Value::Integer(reader.i64()?),
        KIND_FLOAT => Value::Float(f64::from_le_bytes(reader.array::<8>()?)),
        KIND_TEXT => {
            let len = reader.u32()? as usize;
            let bytes = reader.bytes(len)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DbError::DataCorruption(format!("invalid text cell: {}", e)))?;
            Value::Text(text.to_string())
        }
        other => {
            return Err(DbError::DataCorruption(format!(
                "unknown inline value kind {}",
                other
            )))
        }
    };
    Ok((value, reader.position()))
}
