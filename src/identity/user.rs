use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity record owned by the persistence layer.
///
/// Only `id`, `email` and `password_hash` are structural; everything else
/// (name, flags such as `is_admin`) lives in `attributes`. The hash is never
/// serialized out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    #[serde(flatten, default)]
    pub attributes: Map<String, Value>,
}

impl User {
    pub fn new<S: Into<String>>(id: i64, email: S) -> Self {
        Self { id, email: email.into(), ..Default::default() }
    }

    pub fn with_password_hash<S: Into<String>>(mut self, hash: S) -> Self {
        self.password_hash = hash.into();
        self
    }

    pub fn with_attr<S: Into<String>>(mut self, key: S, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Field lookup used by `find_by_field` and presence checks. The password
    /// hash is not addressable.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "email" => Some(Value::String(self.email.clone())),
            "password" | "password_hash" => None,
            other => self.attributes.get(other).cloned(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.attributes.get("is_admin").and_then(|v| v.as_bool()).unwrap_or(false)
    }
}
