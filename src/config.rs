//! Runtime settings for the access-control core.
//!
//! Every field has a default so a host can start with `GatehouseConfig::default()`
//! and overlay `GATEHOUSE_*` environment variables or a JSON document.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Session key holding the authenticated user's id.
    pub session_key: String,
    /// User field matched against the credential identifier in `attempt`.
    pub identifier_field: String,
    /// Destroy the previous session id when regenerating on login/logout.
    pub destroy_old_session: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_key: "auth_user_id".to_string(),
            identifier_field: "email".to_string(),
            destroy_old_session: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 60 * 60, cookie_name: "gatehouse_session".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level or full `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Extra per-target directives, e.g. `("gatehouse::authz", "debug")`.
    pub target_levels: Vec<(String, String)>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), target_levels: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Session key updated by `track_previous` on every non-AJAX GET.
    pub previous_url_key: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self { previous_url_key: "url.previous".to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatehouseConfig {
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub navigation: NavigationConfig,
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl GatehouseConfig {
    /// Defaults overlaid with `GATEHOUSE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("invalid gatehouse config JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Apply overrides from a variable lookup. Unparseable values are ignored
    /// and the current setting kept.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GATEHOUSE_SESSION_KEY") { self.auth.session_key = v; }
        if let Some(v) = lookup("GATEHOUSE_IDENTIFIER_FIELD") { self.auth.identifier_field = v; }
        if let Some(b) = lookup("GATEHOUSE_DESTROY_OLD_SESSION").and_then(|v| parse_bool(&v)) {
            self.auth.destroy_old_session = b;
        }
        if let Some(ttl) = lookup("GATEHOUSE_SESSION_TTL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.session.ttl_secs = ttl;
        }
        if let Some(v) = lookup("GATEHOUSE_SESSION_COOKIE") { self.session.cookie_name = v; }
        if let Some(v) = lookup("GATEHOUSE_LOG_LEVEL") { self.logging.level = v; }
        if let Some(v) = lookup("GATEHOUSE_PREVIOUS_URL_KEY") { self.navigation.previous_url_key = v; }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_session_contract() {
        let c = GatehouseConfig::default();
        assert_eq!(c.auth.session_key, "auth_user_id");
        assert_eq!(c.auth.identifier_field, "email");
        assert!(c.auth.destroy_old_session);
        assert_eq!(c.session.ttl_secs, 3600);
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("GATEHOUSE_IDENTIFIER_FIELD", "username"),
            ("GATEHOUSE_DESTROY_OLD_SESSION", "off"),
            ("GATEHOUSE_SESSION_TTL_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let c = GatehouseConfig::default().with_overrides(|k| env.get(k).map(|s| s.to_string()));
        assert_eq!(c.auth.identifier_field, "username");
        assert!(!c.auth.destroy_old_session);
        assert_eq!(c.session.ttl_secs, 3600);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = GatehouseConfig::from_json_str(r#"{"auth":{"identifier_field":"login"}}"#).unwrap();
        assert_eq!(c.auth.identifier_field, "login");
        assert_eq!(c.auth.session_key, "auth_user_id");
        assert_eq!(c.logging.level, "info");
    }

    #[test]
    fn loads_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("gatehouse.json");
        std::fs::write(&p, r#"{"session":{"ttl_secs":60}}"#)?;
        let c = GatehouseConfig::from_file(&p)?;
        assert_eq!(c.session.ttl_secs, 60);
        assert!(GatehouseConfig::from_file(&dir.path().join("missing.json")).is_err());
        Ok(())
    }
}
