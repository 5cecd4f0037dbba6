//! Cell values and column types understood by the storage core.

mod codec;
mod value;

pub use codec::{decode_value, encode_value};
pub use value::{ColumnType, LobKind, LobRef, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_value_total_order() {
        let mut values = vec![
            Value::Text("b".to_string()),
            Value::Integer(3),
            Value::Null,
            Value::Float(2.5),
            Value::Boolean(true),
            Value::Text("a".to_string()),
            Value::Integer(-1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(-1),
                Value::Float(2.5),
                Value::Integer(3),
                Value::Text("a".to_string()),
                Value::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_integer_and_float_compare_numerically() {
        assert_eq!(Value::Integer(2).cmp(&Value::Float(2.0)), Ordering::Equal);
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert!(Value::Float(1.5) < Value::Integer(2));
    }

    #[test]
    fn test_column_type_accepts() {
        assert!(ColumnType::Integer.accepts(&Value::Integer(1)));
        assert!(!ColumnType::Integer.accepts(&Value::Text("1".to_string())));
        assert!(ColumnType::Float.accepts(&Value::Integer(1)));
        let lob = LobRef {
            kind: LobKind::Binary,
            id: 7,
        };
        assert!(ColumnType::LargeObject.accepts(&Value::LargeObject(lob)));
    }

    #[test]
    fn test_inline_codec() {
        for value in [
            Value::Boolean(false),
            Value::Integer(i64::MIN),
            Value::Float(-0.25),
            Value::Text("héllo".to_string()),
        ] {
            let mut buf = Vec::new();
            encode_value(&value, &mut buf);
            let (decoded, used) = decode_value(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn test_decode_truncated_value_is_corruption() {
        let mut buf = Vec::new();
        encode_value(&Value::Text("abcdef".to_string()), &mut buf);
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            decode_value(&buf),
            Err(crate::DbError::DataCorruption(_))
        ));
    }
}
