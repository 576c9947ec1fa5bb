use crate::types::FastMap;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Identifies one dynamic schema: a declared model plus, for models with a
/// type descriptor, the descriptor's current value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaKey {
    pub model: SmolStr,
    pub descriptor: Option<SmolStr>,
}

impl SchemaKey {
    pub fn new(model: impl Into<SmolStr>, descriptor: Option<&str>) -> Self {
        Self {
            model: model.into(),
            descriptor: descriptor.map(SmolStr::from),
        }
    }

    pub fn typeless(model: impl Into<SmolStr>) -> Self {
        Self {
            model: model.into(),
            descriptor: None,
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.descriptor {
            Some(d) => write!(f, "{}[{}]", self.model, d),
            None => write!(f, "{}", self.model),
        }
    }
}

/// Optional limits checked by the primitive validators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<SmolStr>,
}

/// One registered dynamic attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicFieldDefinition {
    pub schema_key: SchemaKey,
    pub name: SmolStr,
    pub value_kind: SmolStr,
    #[serde(default = "required_by_default")]
    pub required: bool,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub default: Option<Value>,
}

fn required_by_default() -> bool {
    true
}

impl DynamicFieldDefinition {
    pub fn new(
        schema_key: SchemaKey,
        name: impl Into<SmolStr>,
        value_kind: impl Into<SmolStr>,
    ) -> Self {
        Self {
            schema_key,
            name: name.into(),
            value_kind: value_kind.into(),
            required: true,
            constraints: Constraints::default(),
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// The definitions active under one schema key, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    key: Option<SchemaKey>,
    by_name: FastMap<SmolStr, DynamicFieldDefinition>,
}

impl DefinitionSet {
    pub fn new(key: SchemaKey, definitions: impl IntoIterator<Item = DynamicFieldDefinition>) -> Self {
        let by_name = definitions
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect();
        Self {
            key: Some(key),
            by_name,
        }
    }

    pub fn key(&self) -> Option<&SchemaKey> {
        self.key.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&DynamicFieldDefinition> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Definitions ordered by name, so validation reports are stable.
    pub fn sorted(&self) -> Vec<&DynamicFieldDefinition> {
        let mut defs: Vec<_> = self.by_name.values().collect();
        defs.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_key_equality() {
        assert_eq!(
            SchemaKey::new("test_model", Some("email")),
            SchemaKey::new("test_model", Some("email"))
        );
        assert_ne!(
            SchemaKey::new("test_model", Some("email")),
            SchemaKey::new("test_model", Some("contact"))
        );
        assert_ne!(SchemaKey::typeless("test_model"), SchemaKey::new("test_model", Some("")));
        assert_ne!(SchemaKey::typeless("a"), SchemaKey::typeless("b"));
    }

    #[test]
    fn test_schema_key_display() {
        assert_eq!(SchemaKey::new("test_model", Some("email")).to_string(), "test_model[email]");
        assert_eq!(SchemaKey::typeless("typeless_model").to_string(), "typeless_model");
    }

    #[test]
    fn test_definition_defaults_to_required() {
        let def = DynamicFieldDefinition::new(SchemaKey::typeless("m"), "info", "TextField");
        assert!(def.required);
        assert!(!def.optional().required);
    }

    #[test]
    fn test_definition_json_omits_defaults() {
        let json = r#"{
            "schema_key": {"model": "m", "descriptor": null},
            "name": "info",
            "value_kind": "TextField"
        }"#;
        let def: DynamicFieldDefinition = serde_json::from_str(json).unwrap();
        assert!(def.required);
        assert_eq!(def.constraints, Constraints::default());
        assert_eq!(def.default, None);
    }

    #[test]
    fn test_definition_set_lookup() {
        let key = SchemaKey::typeless("m");
        let set = DefinitionSet::new(
            key.clone(),
            [
                DynamicFieldDefinition::new(key.clone(), "b", "CharField"),
                DynamicFieldDefinition::new(key.clone(), "a", "CharField"),
            ],
        );
        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(set.get("c").is_none());
        let names: Vec<_> = set.sorted().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(set.key(), Some(&key));
    }
}
