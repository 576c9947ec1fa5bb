//! Input forms over dynamic records.
//!
//! A form validates the editable declared fields found in its data, then the
//! dynamic fields of the instance's schema, and saves both in one go.

use crate::db::RecordStore;
use crate::error::DynamicError;
use crate::model::ModelDef;
use crate::record::DynamicRecord;
use crate::resolver::SchemaResolver;
use crate::schema::Constraints;
use crate::validator::{DynamicValidator, ValidationResult};
use crate::validators::ValidatorRegistry;
use crate::value::{ObjectMap, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct DynamicForm {
    record: DynamicRecord,
    registry: Arc<ValidatorRegistry>,
    data: ObjectMap,
    result: Option<ValidationResult>,
}

impl DynamicForm {
    /// Form for a fresh instance of `model`. Fails with a configuration error
    /// when the model has no dynamic attributes.
    pub fn new(
        model: Arc<ModelDef>,
        resolver: SchemaResolver,
        registry: Arc<ValidatorRegistry>,
        data: ObjectMap,
    ) -> Result<Self, DynamicError> {
        let record = DynamicRecord::new(model, resolver)?;
        Ok(Self::with_instance(record, registry, data))
    }

    pub fn with_instance(
        record: DynamicRecord,
        registry: Arc<ValidatorRegistry>,
        data: ObjectMap,
    ) -> Self {
        Self {
            record,
            registry,
            data,
            result: None,
        }
    }

    pub fn instance(&self) -> &DynamicRecord {
        &self.record
    }

    pub fn data(&self) -> &ObjectMap {
        &self.data
    }

    /// Validate once and keep the result for later calls.
    pub fn is_valid(&mut self) -> Result<bool, DynamicError> {
        if self.result.is_none() {
            self.result = Some(self.validate()?);
        }
        Ok(self.result.as_ref().is_some_and(ValidationResult::is_valid))
    }

    /// Error messages for `name`. Empty before validation and for names
    /// that passed.
    pub fn errors(&self, name: &str) -> &[String] {
        self.result
            .as_ref()
            .map(|r| r.errors_for(name))
            .unwrap_or(&[])
    }

    /// Validated values, available once [`is_valid`](Self::is_valid) ran.
    pub fn cleaned_data(&self) -> Option<&ObjectMap> {
        self.result.as_ref().map(|r| &r.values)
    }

    fn validate(&self) -> Result<ValidationResult, DynamicError> {
        let model = self.record.model();
        let mut result = ValidationResult::default();

        // Non-editable declared fields never come from form data.
        for field in model.fields.iter().filter(|f| f.editable) {
            let raw = self.data.get(&field.name);
            // Blank input clears an optional declared field.
            if let Some(blank) = raw.filter(|v| !field.required && v.is_blank()) {
                let cleared = match blank {
                    Value::Str(_) => Value::from(""),
                    _ => Value::Null,
                };
                result.values.insert(field.name.clone(), cleared);
                result.errors.insert(field.name.clone(), Vec::new());
                continue;
            }
            let validator = self.registry.validator_for(&field.kind)?;
            result.check_field(
                &field.name,
                validator.as_ref(),
                raw,
                field.required,
                None,
                &Constraints::default(),
            );
        }

        // An editable descriptor in the data selects the schema it will have
        // after saving.
        let submitted = model
            .type_descriptor()
            .and_then(|field| result.values.get(field));
        let key = match submitted {
            Some(value) => SchemaResolver::key_for(model, Some(value)),
            None => self.record.schema_key(),
        };

        let dynamic = DynamicValidator::new(
            Arc::clone(model),
            self.record.resolver().clone(),
            Arc::clone(&self.registry),
        );
        result.merge(dynamic.validate(&key, &self.data)?);
        Ok(result)
    }

    /// Apply the validated values to the instance and persist it.
    pub fn save(mut self, store: &dyn RecordStore) -> Result<DynamicRecord, DynamicError> {
        if !self.is_valid()? {
            let fields = self
                .result
                .as_ref()
                .map(ValidationResult::invalid_fields)
                .unwrap_or_default();
            return Err(DynamicError::InvalidForm { fields });
        }
        let values = self.result.take().map(|r| r.values).unwrap_or_default();
        let model = Arc::clone(self.record.model());
        let mut record = self.record;

        let (declared, dynamic): (Vec<_>, Vec<_>) = values
            .into_iter()
            .partition(|(name, _)| model.is_declared(name));
        for (name, value) in declared {
            record.set(&name, value)?;
        }

        record.pin_schema()?;
        let applied = dynamic
            .into_iter()
            .try_for_each(|(name, value)| record.set_dynamic(&name, value));
        record.release_schema();
        applied?;

        let id = record.save(store)?;
        debug!(model = %model.name, id, "saved form");
        Ok(record)
    }
}
