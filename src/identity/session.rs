use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::config::SessionConfig;
use crate::error::AppError;
use crate::logging::redact;
use crate::tprintln;

/// Key-value store scoped to one client.
///
/// This is the only surface the authentication service and the flash helpers
/// touch; hosts can back it with cookies, a database or the in-memory
/// [`SessionManager`] below.
pub trait SessionStore: Send + Sync {
    /// Current session identifier.
    fn id(&self) -> String;
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn remove(&self, key: &str);
    /// Move the data to a fresh identifier. With `destroy_old` the previous
    /// identifier stops resolving.
    fn regenerate(&self, destroy_old: bool);
}

#[derive(Debug)]
struct SessionEntry {
    data: Map<String, Value>,
    expires_at: Instant,
}

fn gen_id() -> Result<String, getrandom::Error> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

// Panics instead of handing out a predictable id.
fn fresh_id() -> String {
    match gen_id() {
        Ok(sid) => sid,
        Err(e) => {
            tracing::error!(target: "auth", error = %e, "session id generation failed");
            panic!("OS random number generator unavailable: {e}")
        }
    }
}

/// In-memory session backend shared across requests.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self::new(Duration::from_secs(cfg.ttl_secs))
    }

    /// Open a brand new, empty session.
    ///
    /// # Panics
    /// If the OS random number generator fails; use [`Self::try_start`] to
    /// handle that case.
    pub fn start(&self) -> SessionHandle {
        self.open(fresh_id())
    }

    pub fn try_start(&self) -> Result<SessionHandle, AppError> {
        let sid = gen_id().map_err(|e| AppError::internal("session_rng".to_string(), format!("session id generation failed: {e}")))?;
        Ok(self.open(sid))
    }

    fn open(&self, sid: String) -> SessionHandle {
        self.sessions.write().insert(sid.clone(), SessionEntry { data: Map::new(), expires_at: Instant::now() + self.ttl });
        tprintln!("session.start sid={} ttl_secs={}", redact(&sid), self.ttl.as_secs());
        SessionHandle { manager: self.clone(), sid: RwLock::new(sid) }
    }

    /// Reattach to an existing session by id; unknown or expired ids get a
    /// fresh session instead.
    pub fn resume(&self, sid: &str) -> SessionHandle {
        if self.is_live(sid) {
            return SessionHandle { manager: self.clone(), sid: RwLock::new(sid.to_string()) };
        }
        self.sessions.write().remove(sid);
        self.start()
    }

    pub fn is_live(&self, sid: &str) -> bool {
        let now = Instant::now();
        self.sessions.read().get(sid).map(|e| e.expires_at > now).unwrap_or(false)
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Drop expired sessions, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, e| e.expires_at > now);
        let removed = before - map.len();
        if removed > 0 { tracing::debug!(target: "auth", removed, "session_sweep"); }
        removed
    }

    fn read_key(&self, sid: &str, key: &str) -> Option<Value> {
        let now = Instant::now();
        let map = self.sessions.read();
        let entry = map.get(sid)?;
        if entry.expires_at <= now { return None; }
        entry.data.get(key).cloned()
    }

    fn write_key(&self, sid: &str, key: &str, value: Option<Value>) {
        let expires_at = Instant::now() + self.ttl;
        let now = Instant::now();
        let mut map = self.sessions.write();
        let entry = map.entry(sid.to_string()).or_insert_with(|| SessionEntry { data: Map::new(), expires_at });
        // an expired session starts over empty
        if entry.expires_at <= now {
            entry.data.clear();
        }
        entry.expires_at = expires_at;
        match value {
            Some(v) => { entry.data.insert(key.to_string(), v); }
            None => { entry.data.remove(key); }
        }
    }

    fn move_session(&self, old_sid: &str, destroy_old: bool) -> String {
        let new_sid = fresh_id();
        let now = Instant::now();
        let mut map = self.sessions.write();
        let old = if destroy_old { map.remove(old_sid) } else { map.get(old_sid).map(|e| SessionEntry { data: e.data.clone(), expires_at: e.expires_at }) };
        let data = old.filter(|e| e.expires_at > now).map(|e| e.data).unwrap_or_default();
        map.insert(new_sid.clone(), SessionEntry { data, expires_at: Instant::now() + self.ttl });
        new_sid
    }
}

/// One client's view of a [`SessionManager`]. Follows its own id across
/// `regenerate`.
pub struct SessionHandle {
    manager: SessionManager,
    sid: RwLock<String>,
}

impl SessionStore for SessionHandle {
    fn id(&self) -> String { self.sid.read().clone() }

    fn get(&self, key: &str) -> Option<Value> {
        let sid = self.sid.read();
        self.manager.read_key(&sid, key)
    }

    fn set(&self, key: &str, value: Value) {
        let sid = self.sid.read();
        self.manager.write_key(&sid, key, Some(value));
    }

    fn remove(&self, key: &str) {
        let sid = self.sid.read();
        self.manager.write_key(&sid, key, None);
    }

    fn regenerate(&self, destroy_old: bool) {
        let mut sid = self.sid.write();
        let new_sid = self.manager.move_session(&sid, destroy_old);
        tracing::debug!(target: "auth", old = %redact(&sid), new = %redact(&new_sid), destroy_old, "session_regenerate");
        *sid = new_sid;
    }
}
