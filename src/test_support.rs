// ═══════════════════════════════════════════════════════════════════════
// Shared fixtures for the engine tests
// ═══════════════════════════════════════════════════════════════════════
use crate::db::{DefinitionStore, RedbStore};
use crate::model::{DynamicOptions, FieldDef, IgnoreRule, ModelDef};
use crate::record::DynamicRecord;
use crate::resolver::SchemaResolver;
use crate::schema::{DynamicFieldDefinition, SchemaKey};
use crate::validators::ValidatorRegistry;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Declared `type` (descriptor, not editable) and `about`, with dynamic
/// attributes and one ignored name.
pub fn test_model() -> Arc<ModelDef> {
    ModelDef::builder("test_model")
        .field(FieldDef::new("type", "CharField").not_editable().default_value(""))
        .field(FieldDef::new("about", "CharField").default_value("about value"))
        .type_descriptor("type")
        .dynamic(DynamicOptions::default().ignore(IgnoreRule::exact("schema_custom_ignore")))
        .build()
}

/// Same declared fields, no dynamic support.
pub fn false_model() -> Arc<ModelDef> {
    ModelDef::builder("false_model")
        .field(FieldDef::new("type", "CharField").not_editable().default_value(""))
        .field(FieldDef::new("about", "CharField").default_value("about value"))
        .type_descriptor("type")
        .build()
}

/// Dynamic model without a type descriptor.
pub fn typeless_model() -> Arc<ModelDef> {
    ModelDef::builder("typeless_model")
        .field(FieldDef::new("about", "CharField").default_value("about value"))
        .dynamic(DynamicOptions::default())
        .build()
}

/// A temporary redb store with a resolver over it. Every fixture starts with
/// no definitions.
pub struct Fixture {
    _tmp: NamedTempFile,
    pub store: Arc<RedbStore>,
    pub resolver: SchemaResolver,
    pub registry: Arc<ValidatorRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = NamedTempFile::new().expect("temp file");
        let store = Arc::new(RedbStore::new(tmp.path()).expect("open store"));
        let resolver = SchemaResolver::new(store.clone());
        Self {
            _tmp: tmp,
            store,
            resolver,
            registry: Arc::new(ValidatorRegistry::with_builtins()),
        }
    }

    pub fn record(&self, model: Arc<ModelDef>) -> DynamicRecord {
        DynamicRecord::new(model, self.resolver.clone()).expect("dynamic model")
    }

    pub fn define(&self, key: &SchemaKey, name: &str, kind: &str) {
        self.define_with(DynamicFieldDefinition::new(key.clone(), name, kind));
    }

    pub fn define_with(&self, definition: DynamicFieldDefinition) {
        self.store.create(&definition).expect("store definition");
    }
}
