use super::types::{DefinitionStore, RecordId, RecordStore, StoreConfig, StoreError};
use crate::row::RowBuf;
use crate::schema::{DynamicFieldDefinition, SchemaKey};
use crate::serialization::serialize_row;
use crate::value::ObjectMap;
use lru::LruCache;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};

// Table definitions
// Key: "table:id"
// Value: serialized row (hybrid format)
const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
// Key: table name, Value: last allocated id
const SEQUENCES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequences");
// Key: "<len>:model" + ("-" | "=<len>:descriptor") + "<len>:name",
// Value: CBOR-encoded definition
const DEFINITIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("dynamic_fields");

pub struct RedbStore {
    db: Database,
    cache: Mutex<LruCache<String, RowBuf>>,
}

impl RedbStore {
    /// Open or create the database at the specified path with the default
    /// configuration.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new_with_config(path, StoreConfig::default())
    }

    /// Open or create the database at the specified path.
    /// Also ensures that the required tables exist.
    pub fn new_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS_TABLE)?;
            let _ = write_txn.open_table(SEQUENCES_TABLE)?;
            let _ = write_txn.open_table(DEFINITIONS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            cache: Mutex::new(LruCache::new(config.cache_capacity)),
        })
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, LruCache<String, RowBuf>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of rows currently held by the row cache.
    pub fn cached_rows(&self) -> usize {
        self.cache().len()
    }
}

// ─── Keys ───────────────────────────────────────────────────────────────────

fn record_key(table: &str, id: RecordId) -> Result<String, StoreError> {
    if table.is_empty() || table.contains(':') {
        return Err(StoreError::InvalidKey(format!(
            "table name '{table}' must be non-empty and must not contain ':'"
        )));
    }
    Ok(format!("{table}:{id}"))
}

/// Length-prefixed key component. Any string is accepted, and a parsed
/// prefix never runs into the following component.
fn component(part: &str) -> String {
    format!("{}:{part}", part.len())
}

/// Prefix shared by every definition stored under `key`. A typeless key and a
/// key with an empty descriptor get distinct markers.
fn schema_prefix(key: &SchemaKey) -> String {
    let descriptor = match &key.descriptor {
        None => "-".to_string(),
        Some(d) => format!("={}", component(d)),
    };
    format!("{}{descriptor}", component(&key.model))
}

fn definition_key(def: &DynamicFieldDefinition) -> String {
    format!("{}{}", schema_prefix(&def.schema_key), component(&def.name))
}

fn encode_definition(def: &DynamicFieldDefinition) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    cbor4ii::serde::to_writer(&mut buf, def)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_definition(data: &[u8]) -> Result<DynamicFieldDefinition, StoreError> {
    cbor4ii::serde::from_slice(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

// ─── RecordStore ────────────────────────────────────────────────────────────

impl RecordStore for RedbStore {
    fn save(
        &self,
        table: &str,
        id: Option<RecordId>,
        fields: &ObjectMap,
    ) -> Result<RecordId, StoreError> {
        // Validate the table name before taking the write lock.
        record_key(table, 0)?;
        // Serialize BEFORE begin_write() to keep the write lock short.
        let row = serialize_row(fields)?;

        let write_txn = self.db.begin_write()?;
        let (id, key) = {
            let id = match id {
                Some(id) => id,
                None => {
                    let mut seq = write_txn.open_table(SEQUENCES_TABLE)?;
                    let next = seq.get(table)?.map(|last| last.value()).unwrap_or(0) + 1;
                    seq.insert(table, next)?;
                    next
                }
            };
            let key = record_key(table, id)?;
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            records.insert(key.as_str(), row.as_bytes())?;
            (id, key)
        };
        write_txn.commit()?;

        debug!(table, id, fields = row.field_count, "saved row");
        self.cache().put(key, row);
        Ok(id)
    }

    fn load(&self, table: &str, id: RecordId) -> Result<RowBuf, StoreError> {
        let key = record_key(table, id)?;
        if let Some(row) = self.cache().get(&key) {
            trace!(%key, "row cache hit");
            return Ok(row.clone());
        }

        let read_txn = self.db.begin_read()?;
        let records = read_txn.open_table(RECORDS_TABLE)?;
        let Some(access) = records.get(key.as_str())? else {
            return Err(StoreError::NotFound {
                table: table.into(),
                id,
            });
        };
        // Copy out, the access guard cannot outlive the read transaction.
        let row = RowBuf::from_vec(access.value().to_vec())?;
        self.cache().put(key, row.clone());
        Ok(row)
    }

    fn remove(&self, table: &str, id: RecordId) -> Result<bool, StoreError> {
        let key = record_key(table, id)?;
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut records = write_txn.open_table(RECORDS_TABLE)?;
            records.remove(key.as_str())?.is_some()
        };
        write_txn.commit()?;
        self.cache().pop(&key);
        Ok(existed)
    }
}

// ─── DefinitionStore ────────────────────────────────────────────────────────

impl DefinitionStore for RedbStore {
    fn create(&self, definition: &DynamicFieldDefinition) -> Result<(), StoreError> {
        let key = definition_key(definition);
        let data = encode_definition(definition)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DEFINITIONS_TABLE)?;
            table.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        debug!(schema = %definition.schema_key, name = %definition.name, "stored dynamic field definition");
        Ok(())
    }

    fn delete_all(&self, key: Option<&SchemaKey>) -> Result<usize, StoreError> {
        let prefix = key.map(schema_prefix).unwrap_or_default();

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(DEFINITIONS_TABLE)?;
            let mut doomed = Vec::new();
            for entry in table.range(prefix.as_str()..)? {
                let (k, _) = entry?;
                let k = k.value();
                if !k.starts_with(prefix.as_str()) {
                    break;
                }
                doomed.push(k.to_string());
            }
            for k in &doomed {
                table.remove(k.as_str())?;
            }
            doomed.len()
        };
        write_txn.commit()?;
        debug!(removed, scoped = key.is_some(), "deleted dynamic field definitions");
        Ok(removed)
    }

    fn query(&self, key: &SchemaKey) -> Result<Vec<DynamicFieldDefinition>, StoreError> {
        let prefix = schema_prefix(key);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEFINITIONS_TABLE)?;
        let mut out = Vec::new();
        for entry in table.range(prefix.as_str()..)? {
            let (k, v) = entry?;
            if !k.value().starts_with(prefix.as_str()) {
                break;
            }
            out.push(decode_definition(v.value())?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use smol_str::SmolStr;
    use std::num::NonZeroUsize;
    use tempfile::NamedTempFile;

    fn open() -> Result<(NamedTempFile, RedbStore), Box<dyn std::error::Error>> {
        let tmp_file = NamedTempFile::new()?;
        let store = RedbStore::new(tmp_file.path())?;
        Ok((tmp_file, store))
    }

    fn make_fields(about: &str) -> ObjectMap {
        let mut map = ObjectMap::new();
        map.insert(SmolStr::new("about"), Value::from(about));
        map.insert(SmolStr::new("extra_fields"), Value::Bytes(vec![0xa0]));
        map
    }

    #[test]
    fn test_record_store_basics() -> Result<(), Box<dyn std::error::Error>> {
        let (_tmp, store) = open()?;

        // 1. Insert allocates ids per table
        let first = store.save("test_model", None, &make_fields("one"))?;
        let second = store.save("test_model", None, &make_fields("two"))?;
        let other = store.save("typeless_model", None, &make_fields("three"))?;
        assert_eq!((first, second, other), (1, 2, 1));

        // 2. Load
        let row = store.load("test_model", second)?;
        assert_eq!(row.as_row().get_field("about"), Some(Value::from("two")));
        assert_eq!(row.as_row().get_bytes("extra_fields"), Some(&[0xa0u8][..]));

        // 3. Overwrite keeps the id
        let same = store.save("test_model", Some(first), &make_fields("changed"))?;
        assert_eq!(same, first);
        let row = store.load("test_model", first)?;
        assert_eq!(row.as_row().get_field("about"), Some(Value::from("changed")));

        // 4. Remove
        assert!(store.remove("test_model", first)?);
        assert!(!store.remove("test_model", first)?);
        assert!(matches!(
            store.load("test_model", first),
            Err(StoreError::NotFound { id: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_rows_survive_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_file = NamedTempFile::new()?;
        let id = {
            let store = RedbStore::new(tmp_file.path())?;
            store.save("test_model", None, &make_fields("persisted"))?
        };
        let store = RedbStore::new(tmp_file.path())?;
        assert_eq!(store.cached_rows(), 0);
        let row = store.load("test_model", id)?;
        assert_eq!(row.as_row().get_field("about"), Some(Value::from("persisted")));
        Ok(())
    }

    #[test]
    fn test_row_cache_is_bounded() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_file = NamedTempFile::new()?;
        let config = StoreConfig {
            cache_capacity: NonZeroUsize::new(2).unwrap(),
        };
        let store = RedbStore::new_with_config(tmp_file.path(), config)?;
        for i in 0..5 {
            store.save("test_model", None, &make_fields(&format!("row {i}")))?;
        }
        assert_eq!(store.cached_rows(), 2);
        // Evicted rows are re-read from disk.
        let row = store.load("test_model", 1)?;
        assert_eq!(row.as_row().get_field("about"), Some(Value::from("row 0")));
        Ok(())
    }

    #[test]
    fn test_invalid_table_name() -> Result<(), Box<dyn std::error::Error>> {
        let (_tmp, store) = open()?;
        assert!(matches!(
            store.save("bad:name", None, &make_fields("x")),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.load("", 1), Err(StoreError::InvalidKey(_))));
        Ok(())
    }

    #[test]
    fn test_definitions_are_scoped_by_schema_key() -> Result<(), Box<dyn std::error::Error>> {
        let (_tmp, store) = open()?;
        let typeless = SchemaKey::new("test_model", None);
        let empty = SchemaKey::new("test_model", Some(""));
        let email = SchemaKey::new("test_model", Some("email"));
        let other_model = SchemaKey::new("test_model_2", None);

        store.create(&DynamicFieldDefinition::new(typeless.clone(), "a", "CharField"))?;
        store.create(&DynamicFieldDefinition::new(empty.clone(), "b", "CharField"))?;
        store.create(&DynamicFieldDefinition::new(email.clone(), "c", "EmailField"))?;
        store.create(&DynamicFieldDefinition::new(email.clone(), "d", "TextField").optional())?;
        store.create(&DynamicFieldDefinition::new(other_model.clone(), "e", "CharField"))?;

        let names = |key: &SchemaKey| -> Result<Vec<String>, StoreError> {
            Ok(store.query(key)?.into_iter().map(|d| d.name.to_string()).collect())
        };
        assert_eq!(names(&typeless)?, ["a"]);
        assert_eq!(names(&empty)?, ["b"]);
        assert_eq!(names(&email)?, ["c", "d"]);
        assert_eq!(names(&other_model)?, ["e"]);
        assert!(names(&SchemaKey::new("test_model", Some("contact")))?.is_empty());

        let d = store.query(&email)?.pop().unwrap();
        assert!(!d.required);
        assert_eq!(d.value_kind, "TextField");
        Ok(())
    }

    #[test]
    fn test_create_is_an_upsert() -> Result<(), Box<dyn std::error::Error>> {
        let (_tmp, store) = open()?;
        let key = SchemaKey::new("test_model", Some("info"));
        store.create(&DynamicFieldDefinition::new(key.clone(), "info", "CharField"))?;
        store.create(
            &DynamicFieldDefinition::new(key.clone(), "info", "TextField")
                .with_default(Value::from("n/a")),
        )?;
        let defs = store.query(&key)?;
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].value_kind, "TextField");
        assert_eq!(defs[0].default, Some(Value::from("n/a")));
        Ok(())
    }

    #[test]
    fn test_delete_all() -> Result<(), Box<dyn std::error::Error>> {
        let (_tmp, store) = open()?;
        let email = SchemaKey::new("test_model", Some("email"));
        let contact = SchemaKey::new("test_model", Some("contact"));
        store.create(&DynamicFieldDefinition::new(email.clone(), "email", "EmailField"))?;
        store.create(&DynamicFieldDefinition::new(contact.clone(), "phone", "CharField"))?;
        store.create(&DynamicFieldDefinition::new(contact.clone(), "name", "CharField"))?;

        assert_eq!(store.delete_all(Some(&contact))?, 2);
        assert_eq!(store.query(&email)?.len(), 1);
        assert!(store.query(&contact)?.is_empty());

        store.create(&DynamicFieldDefinition::new(contact.clone(), "phone", "CharField"))?;
        assert_eq!(store.delete_all(None)?, 2);
        assert!(store.query(&email)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_any_key_text_is_stored() -> Result<(), Box<dyn std::error::Error>> {
        let (_tmp, store) = open()?;
        let odd = SchemaKey::new("test_model", Some("a\u{1f}b"));
        let split = SchemaKey::new("test_model", Some("a"));
        let digits = SchemaKey::new("test_model", Some("1"));
        assert!(store.query(&odd)?.is_empty());

        store.create(&DynamicFieldDefinition::new(odd.clone(), "x:y", "CharField"))?;
        store.create(&DynamicFieldDefinition::new(split.clone(), "\u{1f}b", "CharField"))?;
        store.create(&DynamicFieldDefinition::new(digits.clone(), "1:a", "CharField"))?;

        let names = |key: &SchemaKey| -> Result<Vec<String>, StoreError> {
            Ok(store.query(key)?.into_iter().map(|d| d.name.to_string()).collect())
        };
        assert_eq!(names(&odd)?, ["x:y"]);
        assert_eq!(names(&split)?, ["\u{1f}b"]);
        assert_eq!(names(&digits)?, ["1:a"]);
        assert!(names(&SchemaKey::new("test_model", Some("11")))?.is_empty());

        assert_eq!(store.delete_all(Some(&split))?, 1);
        assert_eq!(names(&odd)?, ["x:y"]);
        Ok(())
    }
}
