//! Persistence boundary for users.
//!
//! The ORM is an external collaborator; these traits are the only shape the
//! core relies on. `MemoryUserStore` is a complete in-process implementation
//! used by tests and by hosts that do not need durable users.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use serde_json::Value;

use super::user::User;
use crate::validation::PresenceVerifier;

pub trait UserDirectory: Send + Sync {
    fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    fn find_by_field(&self, field: &str, value: &Value) -> Result<Option<User>>;
}

/// Mutating side of the user model, used by controllers.
pub trait UserRepository: UserDirectory {
    /// Insert a new user; the store assigns the id.
    fn create(&self, user: User) -> Result<User>;
    /// Replace the stored record with the same id.
    fn update(&self, user: &User) -> Result<()>;
    /// Returns whether a record was removed.
    fn delete(&self, id: i64) -> Result<bool>;
}

/// Table name the in-memory store answers presence checks for.
pub const USERS_TABLE: &str = "users";

#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<BTreeMap<i64, User>>,
    lookups: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self { Self::default() }

    /// Seed a record keeping its id (fixtures, bootstrap admin).
    pub fn insert(&self, user: User) {
        self.rows.write().insert(user.id, user);
    }

    /// Number of `find_*` calls served so far.
    pub fn lookup_count(&self) -> usize { self.lookups.load(Ordering::SeqCst) }

    pub fn len(&self) -> usize { self.rows.read().len() }

    pub fn is_empty(&self) -> bool { self.rows.read().is_empty() }
}

fn values_match(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => a.to_string() == *b,
        (a, b) => a == b,
    }
}

impl UserDirectory for MemoryUserStore {
    fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.read().get(&id).cloned())
    }

    fn find_by_field(&self, field: &str, value: &Value) -> Result<Option<User>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.read();
        Ok(rows.values().find(|u| u.field(field).map(|v| values_match(&v, value)).unwrap_or(false)).cloned())
    }
}

impl UserRepository for MemoryUserStore {
    fn create(&self, mut user: User) -> Result<User> {
        let mut rows = self.rows.write();
        let next = rows.keys().next_back().copied().unwrap_or(0) + 1;
        user.id = next;
        rows.insert(next, user.clone());
        Ok(user)
    }

    fn update(&self, user: &User) -> Result<()> {
        let mut rows = self.rows.write();
        match rows.get_mut(&user.id) {
            Some(slot) => { *slot = user.clone(); Ok(()) }
            None => Err(anyhow!("user {} not found", user.id)),
        }
    }

    fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}

impl PresenceVerifier for MemoryUserStore {
    fn exists(&self, table: &str, column: &str, value: &Value, ignore_id: Option<&str>) -> Result<bool> {
        if table != USERS_TABLE {
            return Err(anyhow!("unknown table '{}'", table));
        }
        let rows = self.rows.read();
        Ok(rows.values().any(|u| {
            if let Some(ignored) = ignore_id {
                if u.id.to_string() == ignored { return false; }
            }
            u.field(column).map(|v| values_match(&v, value)).unwrap_or(false)
        }))
    }
}
