//! Declared-model introspection.
//!
//! A [`ModelDef`] describes a declared record type: its fixed fields, the
//! optional field holding the type descriptor, and whether the type carries
//! dynamic attributes at all.

use crate::value::Value;
use smol_str::SmolStr;
use std::sync::Arc;

/// Reserved-prefix character. Names starting with it never become dynamic.
pub const RESERVED_PREFIX: char = '_';

/// Framework-internal names that are always reserved, on top of the storage
/// slot and anything carrying the reserved prefix.
pub const RESERVED_NAMES: &[&str] = &["_schema", "_meta", "id"];

pub const DEFAULT_SLOT: &str = "extra_fields";

/// Outcome of classifying an attribute name, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrClass {
    Reserved,
    Ignored,
    Declared,
    Dynamic,
    Unknown,
}

/// Names a model keeps out of dynamic handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreRule {
    Exact(SmolStr),
    Prefix(SmolStr),
}

impl IgnoreRule {
    pub fn exact(name: impl Into<SmolStr>) -> Self {
        IgnoreRule::Exact(name.into())
    }

    pub fn prefix(prefix: impl Into<SmolStr>) -> Self {
        IgnoreRule::Prefix(prefix.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            IgnoreRule::Exact(n) => n == name,
            IgnoreRule::Prefix(p) => name.starts_with(p.as_str()),
        }
    }
}

/// Opt-in for dynamic attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicOptions {
    /// Declared blob column that stores the encoded extra fields.
    pub slot: SmolStr,
    pub ignore: Vec<IgnoreRule>,
}

impl Default for DynamicOptions {
    fn default() -> Self {
        Self {
            slot: SmolStr::new_static(DEFAULT_SLOT),
            ignore: Vec::new(),
        }
    }
}

impl DynamicOptions {
    pub fn slot(mut self, slot: impl Into<SmolStr>) -> Self {
        self.slot = slot.into();
        self
    }

    pub fn ignore(mut self, rule: IgnoreRule) -> Self {
        self.ignore.push(rule);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: SmolStr,
    /// Validator kind used when the field is submitted through a form.
    pub kind: SmolStr,
    pub default: Value,
    /// Non-editable fields are never taken from form input.
    pub editable: bool,
    /// Whether a form submission must carry the field.
    pub required: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<SmolStr>, kind: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            default: Value::Null,
            editable: true,
            required: false,
        }
    }

    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn not_editable(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    pub name: SmolStr,
    pub fields: Vec<FieldDef>,
    pub type_descriptor: Option<SmolStr>,
    pub dynamic: Option<DynamicOptions>,
}

impl ModelDef {
    pub fn builder(name: impl Into<SmolStr>) -> ModelBuilder {
        ModelBuilder {
            def: ModelDef {
                name: name.into(),
                fields: Vec::new(),
                type_descriptor: None,
                dynamic: None,
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Name of the declared field whose value selects the dynamic schema.
    pub fn type_descriptor(&self) -> Option<&str> {
        self.type_descriptor.as_deref()
    }

    pub fn supports_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    pub fn slot(&self) -> Option<&str> {
        self.dynamic.as_ref().map(|d| d.slot.as_str())
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        name.starts_with(RESERVED_PREFIX)
            || RESERVED_NAMES.contains(&name)
            || self.slot() == Some(name)
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.dynamic
            .as_ref()
            .is_some_and(|d| d.ignore.iter().any(|rule| rule.matches(name)))
    }

    /// The part of classification that needs no schema lookup. `None` means
    /// the name is a dynamic candidate.
    pub fn static_class(&self, name: &str) -> Option<AttrClass> {
        if self.is_reserved(name) {
            Some(AttrClass::Reserved)
        } else if self.is_ignored(name) {
            Some(AttrClass::Ignored)
        } else if self.is_declared(name) {
            Some(AttrClass::Declared)
        } else {
            None
        }
    }
}

pub struct ModelBuilder {
    def: ModelDef,
}

impl ModelBuilder {
    pub fn field(mut self, field: FieldDef) -> Self {
        self.def.fields.push(field);
        self
    }

    pub fn type_descriptor(mut self, field: impl Into<SmolStr>) -> Self {
        self.def.type_descriptor = Some(field.into());
        self
    }

    pub fn dynamic(mut self, options: DynamicOptions) -> Self {
        self.def.dynamic = Some(options);
        self
    }

    pub fn build(self) -> Arc<ModelDef> {
        Arc::new(self.def)
    }
}
