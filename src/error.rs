// ─── Error ──────────────────────────────────────────────────────────────────
use crate::db::StoreError;
use smol_str::SmolStr;
use thiserror::Error;

/// Failures of the row format and the extra-fields slot codec.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Invalid buffer structure")]
    InvalidBuffer,
    #[error("record exceeds the 32-field limit")]
    TooManyFields,
    #[error("two field names hash to the same index entry")]
    HashCollision,
    #[error("Field not found")]
    FieldNotFound,
    #[error("CBOR error: {0}")]
    CborError(String),
    #[error("Unknown type tag: {0}")]
    UnknownTypeTag(u8),
    #[error("malformed extra-fields slot: {0}")]
    MalformedSlot(String),
}

/// Failures of the dynamic-attribute engine.
#[derive(Debug, Error)]
pub enum DynamicError {
    #[error("'{model}' object has no attribute '{name}'")]
    AttributeNotFound { model: SmolStr, name: SmolStr },
    #[error("extra-fields slot of {model}:{id} cannot be decoded: {source}")]
    MalformedStorageSlot {
        model: SmolStr,
        id: u64,
        #[source]
        source: RecordError,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cannot save an invalid form, errors on: {}", .fields.join(", "))]
    InvalidForm { fields: Vec<SmolStr> },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RecordError> for DynamicError {
    fn from(e: RecordError) -> Self {
        DynamicError::Store(StoreError::from(e))
    }
}
