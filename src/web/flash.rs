//! One-request flash data: validation errors, old input and status messages
//! carried across a redirect.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::identity::SessionStore;
use crate::validation::RedirectSignal;

pub const FLASH_KEY: &str = "_flash";
pub const ERRORS_KEY: &str = "errors";
pub const OLD_INPUT_KEY: &str = "_old_input";

/// Add `key` to the flash bag for the next request.
pub fn flash(session: &dyn SessionStore, key: &str, value: Value) {
    let mut bag = match session.get(FLASH_KEY) {
        Some(Value::Object(m)) => m,
        _ => Map::new(),
    };
    bag.insert(key.to_string(), value);
    session.set(FLASH_KEY, Value::Object(bag));
}

/// Write a redirect signal's errors and old input.
pub fn flash_redirect(session: &dyn SessionStore, signal: &RedirectSignal) {
    let errors: Map<String, Value> = signal.flashed.errors.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect();
    let input: Map<String, Value> = signal.flashed.input.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    flash(session, ERRORS_KEY, Value::Object(errors));
    flash(session, OLD_INPUT_KEY, Value::Object(input));
}

/// Flash data for the current request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlashBag {
    data: Map<String, Value>,
}

impl FlashBag {
    /// Take the flashed data out of the session; a second pull is empty.
    pub fn pull(session: &dyn SessionStore) -> Self {
        let bag = Self::peek(session);
        session.remove(FLASH_KEY);
        bag
    }

    pub fn peek(session: &dyn SessionStore) -> Self {
        match session.get(FLASH_KEY) {
            Some(Value::Object(data)) => FlashBag { data },
            _ => FlashBag::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> { self.data.get(key) }

    pub fn get_str(&self, key: &str) -> Option<&str> { self.get(key).and_then(Value::as_str) }

    pub fn old(&self, field: &str) -> Option<&Value> {
        self.data.get(OLD_INPUT_KEY).and_then(|v| v.get(field))
    }

    pub fn old_str(&self, field: &str) -> Option<&str> { self.old(field).and_then(Value::as_str) }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.data.get(ERRORS_KEY).and_then(|v| v.get(field)).and_then(Value::as_str)
    }

    pub fn errors(&self) -> BTreeMap<String, String> {
        match self.data.get(ERRORS_KEY) {
            Some(Value::Object(m)) => m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn has_errors(&self) -> bool { !self.errors().is_empty() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SessionManager;
    use serde_json::json;

    #[test]
    fn redirect_flash_is_pulled_once() {
        let sm = SessionManager::default();
        let s = sm.start();
        let mut errors = BTreeMap::new();
        errors.insert("email".to_string(), "The email field is required.".to_string());
        let mut input = BTreeMap::new();
        input.insert("name".to_string(), json!("Ann"));
        flash_redirect(&s, &RedirectSignal::back(errors, input));
        flash(&s, "success", json!("Saved"));

        let bag = FlashBag::pull(&s);
        assert_eq!(bag.error("email"), Some("The email field is required."));
        assert_eq!(bag.old_str("name"), Some("Ann"));
        assert_eq!(bag.get_str("success"), Some("Saved"));
        assert!(bag.has_errors());
        assert!(FlashBag::pull(&s).is_empty());
    }

    #[test]
    fn peek_leaves_data() {
        let sm = SessionManager::default();
        let s = sm.start();
        flash(&s, "success", json!("ok"));
        assert!(!FlashBag::peek(&s).is_empty());
        assert!(!FlashBag::peek(&s).is_empty());
    }
}
