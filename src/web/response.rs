//! axum adapters: error bodies and redirect-back responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use super::cookies::clear_session_cookie;
use super::flash::flash_redirect;
use crate::config::SessionConfig;
use crate::error::AppError;
use crate::identity::{AuthenticationService, SessionStore};
use crate::validation::RedirectSignal;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "web", code = self.code_str(), "request failed: {}", self.message());
        }
        (status, Json(json!({"status": "error", "error": self}))).into_response()
    }
}

/// 303 See Other to `location`.
pub fn see_other(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(v) => (StatusCode::SEE_OTHER, [(header::LOCATION, v)]).into_response(),
        Err(_) => AppError::internal("bad_redirect", "Redirect location is not a valid header value").into_response(),
    }
}

/// Render a redirect signal: flash its errors and old input, then send the
/// client back to `location` (usually from [`super::back_url`]).
pub fn redirect_back(signal: &RedirectSignal, session: &dyn SessionStore, location: &str) -> Response {
    flash_redirect(session, signal);
    debug!(target: "web", location, errors = signal.flashed.errors.len(), "redirect back with errors");
    see_other(location)
}

/// Log the actor out and redirect to `location` with the session cookie
/// expired, so the next request starts a fresh session.
pub fn logout_response(auth: &mut AuthenticationService, location: &str, cfg: &SessionConfig) -> Response {
    auth.logout();
    let mut resp = see_other(location);
    if let Some(v) = clear_session_cookie(&cfg.cookie_name) {
        resp.headers_mut().insert(header::SET_COOKIE, v);
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::identity::{MemoryUserStore, SessionManager, User};
    use std::sync::Arc;
    use crate::web::FlashBag;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn app_error_renders_json_body() {
        let resp = AppError::not_found("user_not_found", "User not found").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["error"]["type"], "not_found");
        assert_eq!(v["error"]["code"], "user_not_found");
        assert_eq!(v["error"]["message"], "User not found");
    }

    #[test]
    fn redirect_back_flashes_and_sets_location() {
        let sm = SessionManager::default();
        let s = sm.start();
        let mut errors = BTreeMap::new();
        errors.insert("name".to_string(), "The name field is required.".to_string());
        let resp = redirect_back(&RedirectSignal::back(errors, BTreeMap::new()), &s, "/users/create");
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/users/create");
        assert_eq!(FlashBag::pull(&s).error("name"), Some("The name field is required."));
    }

    #[test]
    fn logout_expires_cookie_and_forgets_actor() {
        let cfg = SessionConfig::default();
        let sm = SessionManager::from_config(&cfg);
        let session = Arc::new(sm.start());
        let users = Arc::new(MemoryUserStore::new());
        users.insert(User::new(4, "dee@example.com"));
        let mut auth = AuthenticationService::new(session.clone(), users, AuthConfig::default());
        auth.login(User::new(4, "dee@example.com"));

        let resp = logout_response(&mut auth, "/login", &cfg);
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
        let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("{}=deleted;", cfg.cookie_name)));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970"));
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn invalid_location_is_internal_error() {
        assert_eq!(see_other("/bad\nheader").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
