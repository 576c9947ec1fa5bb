use crate::error::DynamicError;
use crate::model::ModelDef;
use crate::resolver::SchemaResolver;
use crate::schema::{Constraints, SchemaKey};
use crate::validators::{REQUIRED_MESSAGE, Validator, ValidatorRegistry};
use crate::value::{ObjectMap, Value};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome of validating a set of proposed values.
///
/// Every checked name has an entry in `errors`, empty when it passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub errors: BTreeMap<SmolStr, Vec<String>>,
    pub values: ObjectMap,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }

    pub fn errors_for(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names that collected at least one error.
    pub fn invalid_fields(&self) -> Vec<SmolStr> {
        self.errors
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.values.extend(other.values);
    }

    /// Check one proposed value and record the outcome under `name`.
    ///
    /// Absent or blank input fails when `required`; otherwise it yields
    /// `default` when there is one and is skipped when there is not.
    pub(crate) fn check_field(
        &mut self,
        name: &SmolStr,
        validator: &dyn Validator,
        raw: Option<&Value>,
        required: bool,
        default: Option<&Value>,
        constraints: &Constraints,
    ) {
        let errors = match raw.filter(|v| !v.is_blank()) {
            Some(raw) => match validator.check(raw, constraints) {
                Ok(value) => {
                    self.values.insert(name.clone(), value);
                    Vec::new()
                }
                Err(errors) => errors,
            },
            None if required => vec![REQUIRED_MESSAGE.to_string()],
            None => {
                if let Some(default) = default {
                    self.values.insert(name.clone(), default.clone());
                }
                Vec::new()
            }
        };
        self.errors.insert(name.clone(), errors);
    }
}

/// Validates proposed dynamic values against the definitions of a schema key.
#[derive(Debug, Clone)]
pub struct DynamicValidator {
    model: Arc<ModelDef>,
    resolver: SchemaResolver,
    registry: Arc<ValidatorRegistry>,
}

impl DynamicValidator {
    pub fn new(
        model: Arc<ModelDef>,
        resolver: SchemaResolver,
        registry: Arc<ValidatorRegistry>,
    ) -> Self {
        Self {
            model,
            resolver,
            registry,
        }
    }

    pub fn validate(
        &self,
        key: &SchemaKey,
        proposed: &ObjectMap,
    ) -> Result<ValidationResult, DynamicError> {
        if key.model != self.model.name {
            return Err(DynamicError::Configuration(format!(
                "schema {key} does not belong to model '{}'",
                self.model.name
            )));
        }
        let definitions = self.resolver.definitions_for(key)?;

        let mut result = ValidationResult::default();
        for def in definitions.sorted() {
            if let Some(class) = self.model.static_class(&def.name) {
                debug!(schema = %key, name = %def.name, ?class, "skipping inert definition");
                continue;
            }
            let validator = self.registry.validator_for(&def.value_kind)?;
            result.check_field(
                &def.name,
                validator.as_ref(),
                proposed.get(&def.name),
                def.required,
                def.default.as_ref(),
                &def.constraints,
            );
        }
        debug!(schema = %key, valid = result.is_valid(), "validated dynamic values");
        Ok(result)
    }
}
