use crate::error::RecordError;
use crate::types::*;
use crate::value::{Number, ObjectMap, Value};
use cbor4ii::core::Value as Cbor;
use smol_str::SmolStr;

// ─── Decode Field ───────────────────────────────────────────────────────────

/// Decode a raw row field into a `Value`.
#[inline]
pub fn decode_field(field: FieldRef) -> Option<Value> {
    Some(match field.type_tag {
        TAG_NULL => Value::Null,
        TAG_BOOL => Value::Bool(*field.data.first()? != 0),
        TAG_I64 => {
            let bytes: [u8; 8] = field.data.try_into().ok()?;
            Value::from(i64::from_le_bytes(bytes))
        }
        TAG_F64 => {
            let bytes: [u8; 8] = field.data.try_into().ok()?;
            Value::from(f64::from_le_bytes(bytes))
        }
        TAG_U64 => {
            let bytes: [u8; 8] = field.data.try_into().ok()?;
            Value::from(u64::from_le_bytes(bytes))
        }
        TAG_STR => Value::from(std::str::from_utf8(field.data).ok()?),
        TAG_BYTES => Value::Bytes(field.data.to_vec()),
        TAG_NESTED_CBOR => {
            let cbor_val: Cbor = cbor4ii::serde::from_slice(field.data).ok()?;
            Value::from(cbor_val)
        }
        _ => return None,
    })
}

// ─── Extra-fields slot ──────────────────────────────────────────────────────

fn malformed(what: impl Into<String>) -> RecordError {
    RecordError::MalformedSlot(what.into())
}

fn untag(item: Cbor) -> Result<Value, RecordError> {
    let Cbor::Array(pair) = item else {
        return Err(malformed("expected a [tag, payload] pair"));
    };
    let [tag, payload]: [Cbor; 2] = pair
        .try_into()
        .map_err(|_| malformed("tagged pair must have exactly two items"))?;
    let tag = match tag {
        Cbor::Integer(t) => u8::try_from(t).map_err(|_| RecordError::UnknownTypeTag(u8::MAX))?,
        _ => return Err(malformed("type tag must be an integer")),
    };

    Ok(match (tag, payload) {
        (TAG_NULL, Cbor::Null) => Value::Null,
        (TAG_BOOL, Cbor::Bool(b)) => Value::Bool(b),
        (TAG_I64, Cbor::Integer(i)) => Value::Number(Number::I64(
            i64::try_from(i).map_err(|_| malformed("i64 out of range"))?,
        )),
        (TAG_U64, Cbor::Integer(i)) => Value::Number(Number::U64(
            u64::try_from(i).map_err(|_| malformed("u64 out of range"))?,
        )),
        (TAG_F64, Cbor::Float(f)) => Value::Number(Number::F64(f)),
        (TAG_STR, Cbor::Text(s)) => Value::Str(SmolStr::from(s)),
        (TAG_BYTES, Cbor::Bytes(b)) => Value::Bytes(b),
        (TAG_NESTED_CBOR, Cbor::Array(items)) => {
            Value::Array(items.into_iter().map(untag).collect::<Result<_, _>>()?)
        }
        (TAG_NESTED_CBOR, map @ Cbor::Map(_)) => Value::Object(untag_map(map)?),
        (tag @ TAG_NULL..=TAG_BYTES, _) => {
            return Err(malformed(format!("payload does not match tag {tag}")));
        }
        (tag, _) => return Err(RecordError::UnknownTypeTag(tag)),
    })
}

fn untag_map(map: Cbor) -> Result<ObjectMap, RecordError> {
    let Cbor::Map(entries) = map else {
        return Err(malformed("expected a map of tagged values"));
    };
    let mut out = ObjectMap::new();
    for (k, v) in entries {
        let Cbor::Text(name) = k else {
            return Err(malformed("field names must be text"));
        };
        out.insert(SmolStr::from(name), untag(v)?);
    }
    Ok(out)
}

/// Decode slot bytes back into an extra-fields mapping. Empty input is an
/// empty mapping; anything else must be a well-formed tagged map.
pub fn decode_extra_fields(data: &[u8]) -> Result<ObjectMap, RecordError> {
    if data.is_empty() {
        return Ok(ObjectMap::new());
    }
    let root: Cbor =
        cbor4ii::serde::from_slice(data).map_err(|e| RecordError::CborError(e.to_string()))?;
    untag_map(root)
}
