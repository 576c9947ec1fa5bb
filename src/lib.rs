//! Dynamic attributes for declared record types.
//!
//! A [`model::ModelDef`] declares fixed fields. Models that opt in also carry
//! attributes defined at runtime per [`schema::SchemaKey`]; their values live
//! in an `extra_fields` slot stored next to the declared fields in a
//! [`db::RedbStore`] row.

pub mod db;
pub mod deserialization;
pub mod error;
pub mod form;
pub mod model;
pub mod record;
pub mod resolver;
pub mod row;
pub mod schema;
pub mod serialization;
pub mod types;
pub mod validator;
pub mod validators;
pub mod value;

#[cfg(test)]
mod test_support;

pub use db::{DefinitionStore, RecordStore, RedbStore, StoreConfig, StoreError};
pub use error::{DynamicError, RecordError};
pub use form::DynamicForm;
pub use model::{AttrClass, DynamicOptions, FieldDef, IgnoreRule, ModelDef};
pub use record::DynamicRecord;
pub use resolver::SchemaResolver;
pub use schema::{Constraints, DefinitionSet, DynamicFieldDefinition, SchemaKey};
pub use validator::{DynamicValidator, ValidationResult};
pub use validators::{FieldKind, Validator, ValidatorRegistry};
pub use value::{Number, ObjectMap, Value};
