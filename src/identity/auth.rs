use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::directory::UserDirectory;
use super::password::verify_password;
use super::request_context::RequestContext;
use super::session::SessionStore;
use super::user::User;
use crate::config::AuthConfig;
use crate::logging::redact;

#[derive(Debug, Clone)]
pub struct Credentials {
    /// Matched against the configured identifier field (email by default).
    pub identifier: String,
    pub secret: String,
}

impl Credentials {
    pub fn new<S: Into<String>>(identifier: S, secret: S) -> Self {
        Self { identifier: identifier.into(), secret: secret.into() }
    }
}

/// Request-scoped authentication over a session handle.
///
/// Build one per request and drop it with the request: the resolved actor is
/// memoized on the instance, so sharing it would leak identities between
/// clients. The type is deliberately not `Clone`.
pub struct AuthenticationService {
    session: Arc<dyn SessionStore>,
    directory: Arc<dyn UserDirectory>,
    cfg: AuthConfig,
    // None = not resolved yet; Some(None) = resolved to anonymous/stale id
    cached: Option<Option<User>>,
}

impl AuthenticationService {
    pub fn new(session: Arc<dyn SessionStore>, directory: Arc<dyn UserDirectory>, cfg: AuthConfig) -> Self {
        Self { session, directory, cfg, cached: None }
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> { &self.session }

    fn session_user_id(&self) -> Option<i64> {
        match self.session.get(&self.cfg.session_key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            other => {
                warn!(target: "auth", value = %other, "ignoring malformed session user id");
                None
            }
        }
    }

    /// The authenticated user, if any.
    ///
    /// A missing session key never reaches the directory and is not cached.
    /// Once an id is present, the lookup result is memoized for the life of
    /// this instance, including `None` for an id that no longer resolves.
    pub fn current_user(&mut self) -> Option<&User> {
        if self.cached.is_none() {
            let id = self.session_user_id()?;
            let found = match self.directory.find_by_id(id) {
                Ok(u) => u,
                Err(e) => {
                    warn!(target: "auth", user_id = id, error = %e, "user lookup failed; treating as anonymous");
                    None
                }
            };
            if found.is_none() {
                debug!(target: "auth", user_id = id, "session user id did not resolve");
            }
            self.cached = Some(found);
        }
        self.cached.as_ref().and_then(|u| u.as_ref())
    }

    pub fn is_authenticated(&mut self) -> bool {
        self.current_user().is_some()
    }

    /// Verify credentials and log the matching user in. Any mismatch returns
    /// `false` and leaves the session untouched.
    pub fn attempt(&mut self, credentials: &Credentials) -> bool {
        let wanted = Value::String(credentials.identifier.clone());
        let user = match self.directory.find_by_field(&self.cfg.identifier_field, &wanted) {
            Ok(Some(u)) => u,
            Ok(None) => {
                debug!(target: "auth", "login attempt for unknown identifier");
                return false;
            }
            Err(e) => {
                warn!(target: "auth", error = %e, "credential lookup failed");
                return false;
            }
        };
        if !verify_password(&user.password_hash, &credentials.secret) {
            info!(target: "auth", user_id = user.id, "login attempt rejected");
            return false;
        }
        self.login(user);
        true
    }

    pub fn login(&mut self, user: User) {
        self.session.set(&self.cfg.session_key, Value::from(user.id));
        info!(target: "auth", user_id = user.id, "login");
        self.cached = Some(Some(user));
        self.session.regenerate(self.cfg.destroy_old_session);
        debug!(target: "auth", sid = %redact(&self.session.id()), "session regenerated after login");
    }

    pub fn logout(&mut self) {
        if let Some(Some(u)) = self.cached.as_ref() {
            info!(target: "auth", user_id = u.id, "logout");
        }
        self.cached = None;
        self.session.remove(&self.cfg.session_key);
        self.session.regenerate(self.cfg.destroy_old_session);
    }

    /// Resolve the actor once and hand it to the rest of the request
    /// explicitly.
    pub fn context(&mut self) -> RequestContext {
        RequestContext::new(self.current_user().cloned())
    }
}
