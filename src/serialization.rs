use crate::error::RecordError;
use crate::row::RowBuf;
use crate::types::*;
use crate::value::{Number, ObjectMap, Value};
use arrayvec::ArrayVec;
use cbor4ii::core::Value as Cbor;
use xxhash_rust::const_xxh64::xxh64;

// ─── Row writer ─────────────────────────────────────────────────────────────

/// Serialize a single field value into the data area, returning its type tag.
#[inline]
pub fn write_field_into(buf: &mut Vec<u8>, value: &Value) -> Result<u8, RecordError> {
    Ok(match value {
        Value::Null => TAG_NULL,
        Value::Bool(b) => {
            buf.push(*b as u8);
            TAG_BOOL
        }
        Value::Number(Number::I64(i)) => {
            buf.extend_from_slice(&i.to_le_bytes());
            TAG_I64
        }
        Value::Number(Number::U64(u)) => {
            buf.extend_from_slice(&u.to_le_bytes());
            TAG_U64
        }
        Value::Number(Number::F64(f)) => {
            buf.extend_from_slice(&f.to_le_bytes());
            TAG_F64
        }
        Value::Str(s) => {
            buf.extend_from_slice(s.as_bytes());
            TAG_STR
        }
        Value::Bytes(b) => {
            buf.extend_from_slice(b);
            TAG_BYTES
        }
        Value::Array(_) | Value::Object(_) => {
            cbor4ii::serde::to_writer(&mut *buf, value)
                .map_err(|e| RecordError::CborError(e.to_string()))?;
            TAG_NESTED_CBOR
        }
    })
}

/// Serialize a field map into the hybrid row format.
///
/// **IMPORTANT**: The index is sorted by name_hash, the reader relies on it
/// for binary search.
pub fn serialize_row(map: &ObjectMap) -> Result<RowBuf, RecordError> {
    let field_count = map.len();
    if field_count > MAX_ROW_FIELDS {
        return Err(RecordError::TooManyFields);
    }
    let data_start = HEADER_SIZE + field_count * INDEX_ENTRY_SIZE;

    let mut buf: Vec<u8> = Vec::with_capacity(data_start + field_count * 32);
    // Zero-filled header/index area, written by position below.
    buf.resize(data_start, 0);

    // Stack-allocated sort buffer, no heap allocation for ≤32 fields
    let mut entries: ArrayVec<(&Value, u64), MAX_ROW_FIELDS> = ArrayVec::new();
    for (key, value) in map.iter() {
        let hash = xxh64(key.as_bytes(), 0);
        entries
            .try_push((value, hash))
            .map_err(|_| RecordError::TooManyFields)?;
    }
    entries.sort_unstable_by_key(|(_, hash)| *hash);
    if entries.windows(2).any(|w| w[0].1 == w[1].1) {
        return Err(RecordError::HashCollision);
    }

    buf[0..4].copy_from_slice(&(field_count as u32).to_le_bytes());

    for (i, (value, hash)) in entries.iter().enumerate() {
        let data_offset = buf.len();
        let tag = write_field_into(&mut buf, value)?;
        let data_length = buf.len() - data_offset;

        let idx = HEADER_SIZE + i * INDEX_ENTRY_SIZE;
        let entry = &mut buf[idx..idx + INDEX_ENTRY_SIZE];
        entry[0..8].copy_from_slice(&hash.to_le_bytes());
        entry[8..12].copy_from_slice(&(data_offset as u32).to_le_bytes());
        entry[12..16].copy_from_slice(&(data_length as u32).to_le_bytes());
        entry[16] = tag;
    }

    Ok(RowBuf {
        data_buf: buf,
        field_count,
    })
}

// ─── Extra-fields slot ──────────────────────────────────────────────────────
//
// The slot is a CBOR map of `name -> [tag, payload]`. Nested values carry
// TAG_NESTED_CBOR with an array (or map) of tagged pairs as payload, so every
// level keeps its exact numeric kind.

fn tagged(value: &Value) -> Cbor {
    let (tag, payload) = match value {
        Value::Null => (TAG_NULL, Cbor::Null),
        Value::Bool(b) => (TAG_BOOL, Cbor::Bool(*b)),
        Value::Number(Number::I64(i)) => (TAG_I64, Cbor::Integer((*i).into())),
        Value::Number(Number::U64(u)) => (TAG_U64, Cbor::Integer((*u).into())),
        Value::Number(Number::F64(f)) => (TAG_F64, Cbor::Float(*f)),
        Value::Str(s) => (TAG_STR, Cbor::Text(s.to_string())),
        Value::Bytes(b) => (TAG_BYTES, Cbor::Bytes(b.clone())),
        Value::Array(arr) => (TAG_NESTED_CBOR, Cbor::Array(arr.iter().map(tagged).collect())),
        Value::Object(obj) => (TAG_NESTED_CBOR, tagged_map(obj)),
    };
    Cbor::Array(vec![Cbor::Integer(tag.into()), payload])
}

fn tagged_map(map: &ObjectMap) -> Cbor {
    Cbor::Map(
        map.iter()
            .map(|(k, v)| (Cbor::Text(k.to_string()), tagged(v)))
            .collect(),
    )
}

/// Encode an extra-fields mapping into its slot bytes.
pub fn encode_extra_fields(fields: &ObjectMap) -> Result<Vec<u8>, RecordError> {
    let mut buf = Vec::new();
    cbor4ii::serde::to_writer(&mut buf, &tagged_map(fields))
        .map_err(|e| RecordError::CborError(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserialization::decode_extra_fields;
    use smol_str::SmolStr;

    fn key_of(k: &str) -> SmolStr {
        SmolStr::new(k)
    }

    #[test]
    fn test_row_rejects_too_many_fields() {
        let map: ObjectMap = (0..33)
            .map(|i| (key_of(&format!("f{i}")), Value::Null))
            .collect();
        assert!(matches!(serialize_row(&map), Err(RecordError::TooManyFields)));
    }

    #[test]
    fn test_row_keeps_every_tag() {
        let mut map = ObjectMap::new();
        map.insert(key_of("null"), Value::Null);
        map.insert(key_of("bool"), Value::from(true));
        map.insert(key_of("i64"), Value::from(-5i64));
        map.insert(key_of("u64"), Value::from(u64::MAX));
        map.insert(key_of("f64"), Value::from(2.25f64));
        map.insert(key_of("str"), Value::from("about value"));
        map.insert(key_of("bytes"), Value::Bytes(vec![0, 159, 255]));
        map.insert(
            key_of("nested"),
            Value::Array(vec![Value::from("a"), Value::from(1i64)]),
        );

        let buf = serialize_row(&map).unwrap();
        let row = buf.as_row();
        for (name, value) in &map {
            assert_eq!(row.get_field(name).as_ref(), Some(value), "field {name}");
        }
        assert_eq!(row.get_bytes("bytes"), Some(&[0u8, 159, 255][..]));
        assert_eq!(row.get_bytes("str"), None);
    }

    #[test]
    fn test_slot_keeps_numeric_kinds_at_every_depth() {
        let mut inner = ObjectMap::new();
        inner.insert(key_of("small_u64"), Value::from(5u64));
        inner.insert(key_of("whole_f64"), Value::from(3.0f64));
        let mut fields = ObjectMap::new();
        fields.insert(key_of("experiment"), Value::from("v"));
        fields.insert(key_of("count"), Value::from(5i64));
        fields.insert(key_of("flag"), Value::from(false));
        fields.insert(key_of("nothing"), Value::Null);
        fields.insert(
            key_of("list"),
            Value::Array(vec![Value::from(1u64), Value::Object(inner)]),
        );

        let bytes = encode_extra_fields(&fields).unwrap();
        assert_eq!(decode_extra_fields(&bytes).unwrap(), fields);
    }

    #[test]
    fn test_slot_keeps_non_finite_floats() {
        let mut fields = ObjectMap::new();
        fields.insert(key_of("inf"), Value::from(f64::INFINITY));
        fields.insert(key_of("nan"), Value::from(f64::NAN));

        let decoded = decode_extra_fields(&encode_extra_fields(&fields).unwrap()).unwrap();
        assert_eq!(decoded["inf"], Value::from(f64::INFINITY));
        assert!(decoded["nan"].as_f64().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_empty_mapping_round_trips() {
        let bytes = encode_extra_fields(&ObjectMap::new()).unwrap();
        assert!(decode_extra_fields(&bytes).unwrap().is_empty());
    }
}
