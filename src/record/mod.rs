//! Records of a declared model that also carry dynamic attributes.
//!
//! Every attribute access is classified first (see [`AttrClass`]): reserved,
//! ignored and declared names keep plain semantics, names defined in the
//! instance's dynamic schema live in `extra_fields`, and everything else is a
//! transient local that is never persisted.

use crate::db::{RecordId, RecordStore};
use crate::deserialization::decode_extra_fields;
use crate::error::{DynamicError, RecordError};
use crate::model::{AttrClass, ModelDef};
use crate::resolver::SchemaResolver;
use crate::row::Row;
use crate::schema::{DefinitionSet, DynamicFieldDefinition, SchemaKey};
use crate::serialization::encode_extra_fields;
use crate::types::{FastMap, TAG_BYTES, TAG_NULL};
use crate::value::{ObjectMap, Value};
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub type ExtraFields = ObjectMap;

#[derive(Debug, Clone)]
pub struct DynamicRecord {
    model: Arc<ModelDef>,
    resolver: SchemaResolver,
    id: Option<RecordId>,
    declared: ObjectMap,
    extra_fields: ExtraFields,
    locals: FastMap<SmolStr, Value>,
    /// Definition set held for a batch of operations. Dropped on every write
    /// to the type-descriptor field.
    pinned: Option<Arc<DefinitionSet>>,
}

impl DynamicRecord {
    /// Fresh, unsaved record with every declared field at its default.
    pub fn new(model: Arc<ModelDef>, resolver: SchemaResolver) -> Result<Self, DynamicError> {
        if !model.supports_dynamic() {
            return Err(DynamicError::Configuration(format!(
                "model '{}' does not support dynamic attributes",
                model.name
            )));
        }
        let declared = model
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect();
        Ok(Self {
            model,
            resolver,
            id: None,
            declared,
            extra_fields: ExtraFields::new(),
            locals: FastMap::default(),
            pinned: None,
        })
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn extra_fields(&self) -> &ExtraFields {
        &self.extra_fields
    }

    /// Raw lookup in `extra_fields`, without classification.
    pub fn extra_field(&self, name: &str) -> Option<&Value> {
        self.extra_fields.get(name)
    }

    pub fn remove_extra_field(&mut self, name: &str) -> Option<Value> {
        self.extra_fields.remove(name)
    }

    pub fn schema_key(&self) -> SchemaKey {
        let descriptor_value = self
            .model
            .type_descriptor()
            .and_then(|field| self.declared.get(field));
        SchemaResolver::key_for(&self.model, descriptor_value)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Schema pinning
    // ════════════════════════════════════════════════════════════════════════

    /// Definitions for the current schema key. Served from the pin when it
    /// still matches the key, otherwise fetched from the store.
    pub fn definitions(&self) -> Result<Arc<DefinitionSet>, DynamicError> {
        let key = self.schema_key();
        if let Some(pinned) = &self.pinned {
            if pinned.key() == Some(&key) {
                return Ok(Arc::clone(pinned));
            }
        }
        Ok(Arc::new(self.resolver.definitions_for(&key)?))
    }

    /// Hold the current definition set until [`release_schema`](Self::release_schema)
    /// or the next descriptor write.
    pub fn pin_schema(&mut self) -> Result<Arc<DefinitionSet>, DynamicError> {
        let key = self.schema_key();
        let set = Arc::new(self.resolver.definitions_for(&key)?);
        self.pinned = Some(Arc::clone(&set));
        Ok(set)
    }

    pub fn release_schema(&mut self) {
        self.pinned = None;
    }

    pub fn is_schema_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    /// Active dynamic definitions for this instance, inert ones left out.
    pub fn dynamic_fields(&self) -> Result<Vec<DynamicFieldDefinition>, DynamicError> {
        let defs = self.definitions()?;
        Ok(defs
            .sorted()
            .into_iter()
            .filter(|def| self.model.static_class(&def.name).is_none())
            .cloned()
            .collect())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Classification and attribute access
    // ════════════════════════════════════════════════════════════════════════

    pub fn classify(&self, name: &str) -> Result<AttrClass, DynamicError> {
        if let Some(class) = self.model.static_class(name) {
            return Ok(class);
        }
        let defs = self.definitions()?;
        Ok(classify_dynamic(&defs, name))
    }

    fn not_found(&self, name: &str) -> DynamicError {
        DynamicError::AttributeNotFound {
            model: self.model.name.clone(),
            name: SmolStr::from(name),
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, DynamicError> {
        let class = match self.model.static_class(name) {
            Some(class) => class,
            None => {
                let defs = self.definitions()?;
                if let Some(def) = defs.get(name) {
                    return self
                        .extra_fields
                        .get(name)
                        .or(def.default.as_ref())
                        .cloned()
                        .ok_or_else(|| self.not_found(name));
                }
                AttrClass::Unknown
            }
        };

        let value = match class {
            AttrClass::Declared => self.declared.get(name).cloned(),
            AttrClass::Reserved => self
                .framework_value(name)
                .or_else(|| self.locals.get(name).cloned()),
            _ => self.locals.get(name).cloned(),
        };
        value.ok_or_else(|| self.not_found(name))
    }

    /// Reserved names backed by the record itself: `id` once saved, and
    /// `_meta` describing the model.
    fn framework_value(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.map(Value::from),
            "_meta" => {
                let mut meta = ObjectMap::new();
                meta.insert(SmolStr::new_static("model"), Value::from(self.model.name.clone()));
                meta.insert(
                    SmolStr::new_static("fields"),
                    Value::Array(
                        self.model
                            .fields
                            .iter()
                            .map(|f| Value::from(f.name.clone()))
                            .collect(),
                    ),
                );
                meta.insert(
                    SmolStr::new_static("type_descriptor"),
                    self.model
                        .type_descriptor()
                        .map(Value::from)
                        .unwrap_or_default(),
                );
                Some(Value::Object(meta))
            }
            _ => None,
        }
    }

    /// Set an attribute and report how the name was classified.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<AttrClass, DynamicError> {
        let value = value.into();
        let class = self.classify(name)?;
        match class {
            AttrClass::Declared => {
                if self.model.type_descriptor() == Some(name) && self.pinned.take().is_some() {
                    debug!(model = %self.model.name, "type descriptor changed, schema pin dropped");
                }
                self.declared.insert(SmolStr::from(name), value);
            }
            AttrClass::Dynamic => {
                trace!(model = %self.model.name, name, "dynamic attribute set");
                self.locals.remove(name);
                self.extra_fields.insert(SmolStr::from(name), value);
            }
            AttrClass::Reserved | AttrClass::Ignored | AttrClass::Unknown => {
                self.locals.insert(SmolStr::from(name), value);
            }
        }
        Ok(class)
    }

    /// Set through the dynamic path only. Fails unless `name` classifies as
    /// dynamic for the current schema.
    pub fn set_dynamic(&mut self, name: &str, value: impl Into<Value>) -> Result<(), DynamicError> {
        match self.classify(name)? {
            AttrClass::Dynamic => {
                self.extra_fields.insert(SmolStr::from(name), value.into());
                Ok(())
            }
            _ => Err(self.not_found(name)),
        }
    }

    /// Whether `get(name)` would succeed.
    pub fn has_attr(&self, name: &str) -> Result<bool, DynamicError> {
        match self.get(name) {
            Ok(_) => Ok(true),
            Err(DynamicError::AttributeNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Declared values merged with the extra fields. The storage slot is not
    /// part of it.
    pub fn field_dict(&self) -> ObjectMap {
        let mut dict = self.declared.clone();
        for (name, value) in &self.extra_fields {
            dict.entry(name.clone()).or_insert_with(|| value.clone());
        }
        dict
    }

    // ════════════════════════════════════════════════════════════════════════
    // Persistence
    // ════════════════════════════════════════════════════════════════════════

    /// Declared values plus the encoded slot, ready for a record store.
    pub fn to_row_fields(&self) -> Result<ObjectMap, RecordError> {
        let mut fields = self.declared.clone();
        if let Some(slot) = self.model.slot() {
            let encoded = encode_extra_fields(&self.extra_fields)?;
            fields.insert(SmolStr::from(slot), Value::Bytes(encoded));
        }
        Ok(fields)
    }

    pub fn save(&mut self, store: &dyn RecordStore) -> Result<RecordId, DynamicError> {
        let fields = self.to_row_fields()?;
        let id = store.save(&self.model.name, self.id, &fields)?;
        debug!(
            model = %self.model.name,
            id,
            extra_fields = self.extra_fields.len(),
            "saved dynamic record"
        );
        self.id = Some(id);
        Ok(id)
    }

    pub fn load(
        model: Arc<ModelDef>,
        resolver: SchemaResolver,
        store: &dyn RecordStore,
        id: RecordId,
    ) -> Result<Self, DynamicError> {
        let row = store.load(&model.name, id)?;
        Self::from_row(model, resolver, id, row.as_row())
    }

    /// Rebuild a record from a stored row. Declared fields missing from the
    /// row take their defaults; extra fields are restored verbatim, including
    /// names the current schema no longer defines.
    pub fn from_row(
        model: Arc<ModelDef>,
        resolver: SchemaResolver,
        id: RecordId,
        row: Row<'_>,
    ) -> Result<Self, DynamicError> {
        let mut record = Self::new(model, resolver)?;
        record.id = Some(id);

        for field in &record.model.fields {
            if let Some(value) = row.get_field(&field.name) {
                record.declared.insert(field.name.clone(), value);
            }
        }

        let model = &record.model;
        let corrupt = |source: RecordError| {
            warn!(model = %model.name, id, error = %source, "extra-fields slot is corrupt");
            DynamicError::MalformedStorageSlot {
                model: model.name.clone(),
                id,
                source,
            }
        };
        let slot = model.slot().unwrap_or_default();
        let extra_fields = match row.get_raw(slot) {
            None => ExtraFields::new(),
            Some(field) if field.type_tag == TAG_NULL => ExtraFields::new(),
            Some(field) if field.type_tag == TAG_BYTES => {
                decode_extra_fields(field.data).map_err(corrupt)?
            }
            Some(field) => {
                return Err(corrupt(RecordError::MalformedSlot(format!(
                    "slot stored with type tag {}",
                    field.type_tag
                ))));
            }
        };
        record.extra_fields = extra_fields;
        Ok(record)
    }
}

fn classify_dynamic(defs: &DefinitionSet, name: &str) -> AttrClass {
    if defs.contains(name) {
        AttrClass::Dynamic
    } else {
        AttrClass::Unknown
    }
}
