use crate::deserialization::decode_field;
use crate::error::RecordError;
use crate::types::*;
use crate::value::Value;
use xxhash_rust::xxh64::xxh64;

// ─── Reader (zero-copy) ────────────────────────────────────────────────────
/// Zero-copy reader over a hybrid row byte slice.
/// No parsing happens until you request a specific field.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub data_buf: &'a [u8],
    pub field_count: usize,
}

impl<'a> Row<'a> {
    /// Validate a byte slice and wrap it. The header must be present and the
    /// index must fit inside the buffer.
    pub fn from_bytes(buf: &'a [u8]) -> Result<Self, RecordError> {
        let header = buf.get(0..4).ok_or(RecordError::InvalidBuffer)?;
        let field_count = u32::from_le_bytes(
            header
                .try_into()
                .map_err(|_| RecordError::InvalidBuffer)?,
        ) as usize;
        if buf.len() < HEADER_SIZE + field_count * INDEX_ENTRY_SIZE {
            return Err(RecordError::InvalidBuffer);
        }
        Ok(Self {
            data_buf: buf,
            field_count,
        })
    }

    /// Read the index entry metadata at position `i`.
    #[inline]
    pub fn read_index(&self, i: usize) -> Option<IndexEntry> {
        if i >= self.field_count {
            return None;
        }
        let idx = HEADER_SIZE + i * INDEX_ENTRY_SIZE;
        let entry = self.data_buf.get(idx..idx + INDEX_ENTRY_SIZE)?;
        Some(IndexEntry {
            name_hash: u64::from_le_bytes(entry[0..8].try_into().ok()?),
            data_offset: u32::from_le_bytes(entry[8..12].try_into().ok()?) as usize,
            data_len: u32::from_le_bytes(entry[12..16].try_into().ok()?) as usize,
            type_tag: entry[16],
        })
    }

    #[inline]
    fn read_hash(&self, i: usize) -> Option<u64> {
        let idx = HEADER_SIZE + i * INDEX_ENTRY_SIZE;
        let bytes = self.data_buf.get(idx..idx + 8)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Find a field by name. Linear scan for tiny rows, binary search on the
    /// sorted hashes otherwise.
    pub fn find_field(&self, name: &str) -> Result<IndexEntry, RecordError> {
        let hash = xxh64(name.as_bytes(), 0);
        let n = self.field_count;

        if n <= 4 {
            for i in 0..n {
                if self.read_hash(i) == Some(hash) {
                    return self.read_index(i).ok_or(RecordError::InvalidBuffer);
                }
            }
            return Err(RecordError::FieldNotFound);
        }

        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_hash = self.read_hash(mid).ok_or(RecordError::InvalidBuffer)?;
            match mid_hash.cmp(&hash) {
                std::cmp::Ordering::Equal => {
                    return self.read_index(mid).ok_or(RecordError::InvalidBuffer);
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Err(RecordError::FieldNotFound)
    }

    /// Get raw field reference (zero-copy).
    pub fn get_raw(&self, name: &str) -> Option<FieldRef<'a>> {
        let meta = self.find_field(name).ok()?;
        let data = self
            .data_buf
            .get(meta.data_offset..meta.data_offset + meta.data_len)?;
        Some(FieldRef {
            name_hash: meta.name_hash,
            type_tag: meta.type_tag,
            data,
        })
    }

    /// Get any field as a `Value` (decodes nested CBOR if needed).
    pub fn get_field(&self, name: &str) -> Option<Value> {
        decode_field(self.get_raw(name)?)
    }

    /// Get a blob field without copying.
    pub fn get_bytes(&self, name: &str) -> Option<&'a [u8]> {
        let field = self.get_raw(name)?;
        (field.type_tag == TAG_BYTES).then_some(field.data)
    }

    #[inline]
    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_ok()
    }

    #[inline]
    pub fn iter_fields(&self) -> FieldIter<'a> {
        FieldIter { row: *self, pos: 0 }
    }
}

// ─── Owned buffer ──────────────────────────────────────────────────────────

/// An owned row, as handed out by a record store.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBuf {
    pub data_buf: Vec<u8>,
    pub field_count: usize,
}

impl RowBuf {
    pub fn from_vec(data_buf: Vec<u8>) -> Result<Self, RecordError> {
        let field_count = Row::from_bytes(&data_buf)?.field_count;
        Ok(Self {
            data_buf,
            field_count,
        })
    }

    #[inline]
    pub fn as_row(&self) -> Row<'_> {
        Row {
            data_buf: &self.data_buf,
            field_count: self.field_count,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data_buf
    }
}
