use crate::error::RecordError;
use crate::row::RowBuf;
use crate::schema::{DynamicFieldDefinition, SchemaKey};
use crate::value::ObjectMap;
use smol_str::SmolStr;
use std::num::NonZeroUsize;
use thiserror::Error;

pub type RecordId = u64;

/// Alias for table names. Documents that this string must not contain ':'.
pub type TableName = SmolStr;

/// Configuration for [`RedbStore::new_with_config`](super::RedbStore::new_with_config).
pub struct StoreConfig {
    /// Maximum number of rows kept in the LRU row cache.
    ///
    /// Evicted rows remain on disk in redb and are re-read on the next load.
    ///
    /// Default: 1 000 rows.
    pub cache_capacity: NonZeroUsize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: NonZeroUsize::new(1_000).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Table name contains ':' or a key component is otherwise invalid.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("{table}:{id} does not exist")]
    NotFound { table: TableName, id: RecordId },
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Redb(e.into())
    }
}

impl From<RecordError> for StoreError {
    fn from(e: RecordError) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

// ─── Collaborator seams ─────────────────────────────────────────────────────

/// Persists declared records. Unaware of dynamic attributes: the extra-fields
/// slot is just another blob column by the time it gets here.
pub trait RecordStore: Send + Sync {
    /// Insert (`id == None`, a fresh id is allocated) or overwrite a row.
    fn save(
        &self,
        table: &str,
        id: Option<RecordId>,
        fields: &ObjectMap,
    ) -> Result<RecordId, StoreError>;

    fn load(&self, table: &str, id: RecordId) -> Result<RowBuf, StoreError>;

    /// Returns true if the row existed.
    fn remove(&self, table: &str, id: RecordId) -> Result<bool, StoreError>;
}

/// Stores dynamic-field definitions keyed by schema.
pub trait DefinitionStore: Send + Sync {
    /// Upsert by `(schema_key, name)`.
    fn create(&self, definition: &DynamicFieldDefinition) -> Result<(), StoreError>;

    /// Delete every definition under `key`, or all of them for `None`.
    fn delete_all(&self, key: Option<&SchemaKey>) -> Result<usize, StoreError>;

    fn query(&self, key: &SchemaKey) -> Result<Vec<DynamicFieldDefinition>, StoreError>;
}
