use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use super::input::{InputMap, InputValue};

/// Input that passed validation, restricted to fields named by the rule set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedData(InputMap);

impl ValidatedData {
    pub fn new(map: InputMap) -> Self { ValidatedData(map) }

    pub fn all(&self) -> &InputMap { &self.0 }

    pub fn get(&self, key: &str) -> Option<&InputValue> { self.0.get(key) }

    /// Scalar JSON value of a field, or `default` when absent or not JSON.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.0.get(key).and_then(|v| v.as_json()).cloned().unwrap_or(default)
    }

    pub fn str(&self, key: &str) -> Option<&str> { self.0.get(key).and_then(|v| v.as_str()) }

    pub fn only(&self, keys: &[&str]) -> ValidatedData {
        ValidatedData(self.0.iter().filter(|(k, _)| keys.contains(&k.as_str())).map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn except(&self, keys: &[&str]) -> ValidatedData {
        ValidatedData(self.0.iter().filter(|(k, _)| !keys.contains(&k.as_str())).map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn contains(&self, key: &str) -> bool { self.0.contains_key(key) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn into_inner(self) -> InputMap { self.0 }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
            .collect();
        Value::Object(map)
    }
}

/// Outcome of one validation run.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Passed { validated: ValidatedData },
    Failed {
        /// First message per field.
        errors_by_field: BTreeMap<String, String>,
        /// Every message, in rule-set order.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    pub fn success(&self) -> bool { matches!(self, ValidationResult::Passed { .. }) }

    pub fn validated(&self) -> Option<&ValidatedData> {
        match self {
            ValidationResult::Passed { validated } => Some(validated),
            ValidationResult::Failed { .. } => None,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ValidationResult::Failed { errors, .. } => errors,
            ValidationResult::Passed { .. } => &[],
        }
    }

    pub fn errors_by_field(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ValidationResult::Failed { errors_by_field, .. } => Some(errors_by_field),
            ValidationResult::Passed { .. } => None,
        }
    }

    pub fn first_error(&self, field: &str) -> Option<&str> {
        self.errors_by_field().and_then(|m| m.get(field)).map(String::as_str)
    }

    /// Wire shape: `{success, validated}` or `{success, errors, errorsByField}`.
    pub fn to_json(&self) -> Value {
        match self {
            ValidationResult::Passed { validated } => json!({ "success": true, "validated": validated.to_json() }),
            ValidationResult::Failed { errors_by_field, errors } => json!({
                "success": false,
                "errors": errors,
                "errorsByField": errors_by_field,
            }),
        }
    }
}
