//! Primitive validators, looked up by value-kind name.

use crate::error::DynamicError;
use crate::schema::Constraints;
use crate::types::FastMap;
use crate::value::Value;
use lazy_static::lazy_static;
use regex::Regex;
use smol_str::SmolStr;
use std::str::FromStr;
use std::sync::Arc;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$"
    )
    .expect("email pattern is valid");
}

/// Checks one raw input and turns it into the value to store.
pub trait Validator: Send + Sync {
    fn check(&self, raw: &Value, constraints: &Constraints) -> Result<Value, Vec<String>>;
}

/// The built-in value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Char,
    Text,
    Email,
    Integer,
    Float,
    Boolean,
}

impl FieldKind {
    pub const ALL: [FieldKind; 6] = [
        FieldKind::Char,
        FieldKind::Text,
        FieldKind::Email,
        FieldKind::Integer,
        FieldKind::Float,
        FieldKind::Boolean,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Char => "CharField",
            FieldKind::Text => "TextField",
            FieldKind::Email => "EmailField",
            FieldKind::Integer => "IntegerField",
            FieldKind::Float => "FloatField",
            FieldKind::Boolean => "BooleanField",
        }
    }
}

impl FromStr for FieldKind {
    type Err = DynamicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| unknown_kind(s))
    }
}

fn unknown_kind(kind: &str) -> DynamicError {
    DynamicError::Configuration(format!("no validator registered for value kind '{kind}'"))
}

// ─── Checks ─────────────────────────────────────────────────────────────────

fn text_input(raw: &Value) -> Result<String, Vec<String>> {
    match raw {
        Value::Str(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(vec!["Enter a valid value.".to_string()]),
    }
}

fn check_text(text: String, constraints: &Constraints) -> Result<Value, Vec<String>> {
    let mut errors = Vec::new();
    if let Some(max) = constraints.max_length {
        let len = text.chars().count();
        if len > max {
            errors.push(format!(
                "Ensure this value has at most {max} characters (it has {len})."
            ));
        }
    }
    if !constraints.choices.is_empty() && !constraints.choices.iter().any(|c| *c == text) {
        errors.push(format!(
            "Select a valid choice. {text} is not one of the available choices."
        ));
    }
    if errors.is_empty() {
        Ok(Value::from(text))
    } else {
        Err(errors)
    }
}

fn check_bounds(n: f64, constraints: &Constraints) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(min) = constraints.min_value {
        if n < min {
            errors.push(format!("Ensure this value is greater than or equal to {min}."));
        }
    }
    if let Some(max) = constraints.max_value {
        if n > max {
            errors.push(format!("Ensure this value is less than or equal to {max}."));
        }
    }
    errors
}

impl Validator for FieldKind {
    fn check(&self, raw: &Value, constraints: &Constraints) -> Result<Value, Vec<String>> {
        match self {
            FieldKind::Char | FieldKind::Text => check_text(text_input(raw)?, constraints),
            FieldKind::Email => {
                let text = text_input(raw)?;
                if !EMAIL_RE.is_match(&text) {
                    return Err(vec!["Enter a valid email address.".to_string()]);
                }
                check_text(text, constraints)
            }
            FieldKind::Integer => {
                let parsed = match raw {
                    Value::Number(n) => n.as_i64(),
                    Value::Str(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                let i = parsed.ok_or_else(|| vec!["Enter a whole number.".to_string()])?;
                let errors = check_bounds(i as f64, constraints);
                if errors.is_empty() { Ok(Value::from(i)) } else { Err(errors) }
            }
            FieldKind::Float => {
                let parsed = match raw {
                    Value::Number(n) => Some(n.as_f64()),
                    Value::Str(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                let f = parsed
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| vec!["Enter a number.".to_string()])?;
                let errors = check_bounds(f, constraints);
                if errors.is_empty() { Ok(Value::from(f)) } else { Err(errors) }
            }
            FieldKind::Boolean => {
                let parsed = match raw {
                    Value::Bool(b) => Some(*b),
                    Value::Number(n) => match n.as_i64() {
                        Some(0) => Some(false),
                        Some(1) => Some(true),
                        _ => None,
                    },
                    Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                        "true" | "1" | "on" | "yes" => Some(true),
                        "false" | "0" | "off" | "no" => Some(false),
                        _ => None,
                    },
                    _ => None,
                };
                parsed
                    .map(Value::from)
                    .ok_or_else(|| vec!["Enter a valid boolean.".to_string()])
            }
        }
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// Closed lookup table from value-kind names to validators, filled at startup.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: FastMap<SmolStr, Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for kind in FieldKind::ALL {
            registry.register(kind.as_str(), Arc::new(kind));
        }
        registry
    }

    /// Add or replace the validator for `kind`.
    pub fn register(&mut self, kind: impl Into<SmolStr>, validator: Arc<dyn Validator>) {
        self.validators.insert(kind.into(), validator);
    }

    pub fn validator_for(&self, kind: &str) -> Result<Arc<dyn Validator>, DynamicError> {
        self.validators
            .get(kind)
            .cloned()
            .ok_or_else(|| unknown_kind(kind))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(SmolStr::as_str)
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.kinds().collect();
        kinds.sort_unstable();
        f.debug_struct("ValidatorRegistry").field("kinds", &kinds).finish()
    }
}
