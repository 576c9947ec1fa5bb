use crate::db::{DefinitionStore, StoreError};
use crate::model::ModelDef;
use crate::record::DynamicRecord;
use crate::schema::{DefinitionSet, SchemaKey};
use crate::value::Value;
use std::sync::Arc;
use tracing::debug;

/// Maps record instances to their schema key and schema keys to the
/// definitions stored for them.
#[derive(Clone)]
pub struct SchemaResolver {
    store: Arc<dyn DefinitionStore>,
}

impl SchemaResolver {
    pub fn new(store: Arc<dyn DefinitionStore>) -> Self {
        Self { store }
    }

    /// Key for a model given the current value of its descriptor field.
    /// Typeless models always get a `None` descriptor.
    pub fn key_for(model: &ModelDef, descriptor_value: Option<&Value>) -> SchemaKey {
        let descriptor = model
            .type_descriptor()
            .map(|_| descriptor_value.map(Value::to_key_string).unwrap_or_default());
        SchemaKey {
            model: model.name.clone(),
            descriptor,
        }
    }

    pub fn resolve(&self, record: &DynamicRecord) -> SchemaKey {
        record.schema_key()
    }

    /// Every definition stored under `key`. Empty when none exist.
    pub fn definitions_for(&self, key: &SchemaKey) -> Result<DefinitionSet, StoreError> {
        let definitions = self.store.query(key)?;
        debug!(schema = %key, count = definitions.len(), "resolved dynamic schema");
        Ok(DefinitionSet::new(key.clone(), definitions))
    }
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver").finish_non_exhaustive()
    }
}
