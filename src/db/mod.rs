pub mod db;
pub mod types;

pub use db::RedbStore;
pub use types::{
    DefinitionStore, RecordId, RecordStore, StoreConfig, StoreError, TableName,
};
