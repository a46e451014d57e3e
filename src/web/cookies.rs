//! Session cookie plumbing between axum headers and [`SessionManager`].

use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::SessionConfig;
use crate::identity::{SessionHandle, SessionManager, SessionStore};

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}

/// HttpOnly, Secure, SameSite=Strict cookie scoped to `/`.
pub fn session_cookie(name: &str, sid: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", name, sid)).ok()
}

/// Expired cookie that makes the client drop its session id.
pub fn clear_session_cookie(name: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/", name)).ok()
}

/// Resume the session named by the request cookie, or start a new one.
pub fn session_from_headers(manager: &SessionManager, headers: &HeaderMap, cfg: &SessionConfig) -> SessionHandle {
    match parse_cookie(headers, &cfg.cookie_name) {
        Some(sid) => manager.resume(&sid),
        None => manager.start(),
    }
}

/// `Set-Cookie` header for the handle's current id; call after the handler
/// ran so a regenerated id is picked up.
pub fn attach_session_cookie(headers: &mut HeaderMap, session: &dyn SessionStore, cfg: &SessionConfig) {
    if let Some(v) = session_cookie(&cfg.cookie_name, &session.id()) {
        headers.insert(header::SET_COOKIE, v);
    }
}
