use serde_json::Value;

/// Persistence lookup behind the `unique` and `exists` rules.
///
/// `ignore_id` excludes the record whose primary key matches, so an update
/// can keep its own value. Errors are treated as a failed rule by the engine.
pub trait PresenceVerifier: Send + Sync {
    fn exists(&self, table: &str, column: &str, value: &Value, ignore_id: Option<&str>) -> anyhow::Result<bool>;
}
