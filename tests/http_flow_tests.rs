//! End-to-end request flows over the axum adapters: cookie → session →
//! actor → controller → redirect or JSON error, then the follow-up request
//! reading flashed data.

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde_json::json;

use gatehouse::authz::{AuthServiceProvider, Gate};
use gatehouse::config::GatehouseConfig;
use gatehouse::controllers::UserController;
use gatehouse::identity::{hash_password, AuthenticationService, Credentials, MemoryUserStore, SessionManager, SessionStore, User};
use gatehouse::validation::{RawInput, Validator};
use gatehouse::web::{
    attach_session_cookie, back_url, logout_response, previous_url, session_from_headers, track_previous, FlashBag,
    RequestInfo,
};

struct App {
    cfg: GatehouseConfig,
    sessions: SessionManager,
    users: Arc<MemoryUserStore>,
    controller: UserController,
}

fn app() -> Result<App> {
    let cfg = GatehouseConfig::default();
    let users = Arc::new(MemoryUserStore::new());
    users.insert(
        User::new(1, "admin@example.com")
            .with_password_hash(hash_password("admin-pass")?)
            .with_attr("is_admin", json!(true))
            .with_attr("name", json!("Admin")),
    );
    let gate = AuthServiceProvider::with_defaults().boot(Gate::new());
    let validator = Arc::new(Validator::new().with_presence_verifier(users.clone()));
    let controller = UserController::new(users.clone(), gate, validator);
    Ok(App { sessions: SessionManager::from_config(&cfg.session), cfg, users, controller })
}

fn cookie_headers(cfg: &GatehouseConfig, session: &dyn SessionStore) -> HeaderMap {
    let mut h = HeaderMap::new();
    let value = format!("{}={}", cfg.session.cookie_name, session.id());
    h.insert(header::COOKIE, HeaderValue::from_str(&value).expect("cookie header"));
    h
}

fn login(app: &App) -> HeaderMap {
    let session = Arc::new(app.sessions.start());
    let mut auth = AuthenticationService::new(session.clone(), app.users.clone(), app.cfg.auth.clone());
    assert!(auth.attempt(&Credentials::new("admin@example.com", "admin-pass")));
    let mut out = HeaderMap::new();
    attach_session_cookie(&mut out, &*session, &app.cfg.session);
    let set = out.get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    let pair = set.split(';').next().unwrap_or_default().to_string();
    let mut h = HeaderMap::new();
    h.insert(header::COOKIE, HeaderValue::from_str(&pair).expect("cookie pair"));
    h
}

#[test]
fn invalid_store_redirects_back_with_flash() -> Result<()> {
    let app = app()?;
    let headers = login(&app);

    // GET the create form so "previous" is known
    let session = Arc::new(session_from_headers(&app.sessions, &headers, &app.cfg.session));
    let form_page = RequestInfo::from_parts(&Method::GET, &"/users/create".parse::<Uri>()?, &headers);
    track_previous(&*session, &form_page, &app.cfg.navigation);

    // POST with a bad email
    let ctx = AuthenticationService::new(session.clone(), app.users.clone(), app.cfg.auth.clone()).context();
    assert!(ctx.is_authenticated());
    let raw = RawInput::new().field("name", json!("Cara")).field("email", json!("nope")).field("password", json!("secret1"));
    let err = app.controller.store(&ctx, &raw).unwrap_err();

    let post = RequestInfo::from_parts(&Method::POST, &"/users".parse::<Uri>()?, &headers);
    let previous = previous_url(&*session, &app.cfg.navigation);
    let location = back_url(&post, &FlashBag::peek(&*session), previous.as_deref());
    assert_eq!(location, "/users/create");

    let resp = err.into_response_with(&*session, &location);
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()), Some("/users/create"));

    // follow-up request sees errors and old input exactly once
    let next = session_from_headers(&app.sessions, &cookie_headers(&app.cfg, &*session), &app.cfg.session);
    let bag = FlashBag::pull(&next);
    assert_eq!(bag.error("email"), Some("The email must be a valid email address."));
    assert_eq!(bag.old_str("name"), Some("Cara"));
    assert!(FlashBag::pull(&next).is_empty());
    assert_eq!(app.users.len(), 1);
    Ok(())
}

#[test]
fn valid_store_redirects_to_index_with_success() -> Result<()> {
    let app = app()?;
    let headers = login(&app);
    let session = Arc::new(session_from_headers(&app.sessions, &headers, &app.cfg.session));
    let ctx = AuthenticationService::new(session.clone(), app.users.clone(), app.cfg.auth.clone()).context();

    let raw = RawInput::new().field("name", json!("Cara")).field("email", json!("cara@example.com")).field("password", json!("secret1"));
    let resp = app.controller.store(&ctx, &raw)?.into_response_with(&*session);
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()), Some("/users"));
    assert_eq!(FlashBag::pull(&*session).get_str("success"), Some("User created successfully."));
    assert_eq!(app.users.len(), 2);
    Ok(())
}

#[tokio::test]
async fn guest_destroy_renders_json_not_found() -> Result<()> {
    let app = app()?;
    let session = Arc::new(app.sessions.start());
    let ctx = AuthenticationService::new(session.clone(), app.users.clone(), app.cfg.auth.clone()).context();
    assert!(!ctx.is_authenticated());

    let resp = app.controller.destroy(&ctx, 1).unwrap_err().into_response_with(&*session, "/users");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let v: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(v, json!({"status": "error", "error": {"type": "not_found", "code": "unauthorized", "message": "Unauthorized action."}}));
    assert_eq!(app.users.len(), 1);
    Ok(())
}

#[test]
fn missing_user_redirects_back_with_flashed_error() -> Result<()> {
    let app = app()?;
    let headers = login(&app);
    let session = Arc::new(session_from_headers(&app.sessions, &headers, &app.cfg.session));
    let ctx = AuthenticationService::new(session.clone(), app.users.clone(), app.cfg.auth.clone()).context();

    let mut with_referer = headers.clone();
    with_referer.insert(header::REFERER, HeaderValue::from_static("/users?page=2"));
    let post = RequestInfo::from_parts(&Method::POST, &"/users/42".parse::<Uri>()?, &with_referer);
    let raw = RawInput::new().field("name", json!("Nobody")).field("email", json!("nobody@example.com"));
    let err = app.controller.update(&ctx, 42, &raw, &post, &FlashBag::peek(&*session)).unwrap_err();

    let location = back_url(&post, &FlashBag::peek(&*session), Some("/users"));
    let resp = err.into_response_with(&*session, &location);
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()), Some("/users?page=2"));
    assert_eq!(FlashBag::pull(&*session).get_str("error"), Some("User not found"));

    let resp = app.controller.destroy(&ctx, 42).unwrap_err().into_response_with(&*session, "/users");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(FlashBag::pull(&*session).get_str("error"), Some("User not found"));
    Ok(())
}

#[test]
fn update_redirects_back_to_referer_then_index() -> Result<()> {
    let app = app()?;
    let headers = login(&app);
    let session = Arc::new(session_from_headers(&app.sessions, &headers, &app.cfg.session));
    let ctx = AuthenticationService::new(session.clone(), app.users.clone(), app.cfg.auth.clone()).context();
    let raw = RawInput::new().field("name", json!("Root")).field("email", json!("admin@example.com"));

    let mut with_referer = headers.clone();
    with_referer.insert(header::REFERER, HeaderValue::from_static("/users?page=2"));
    let post = RequestInfo::from_parts(&Method::POST, &"/users/1".parse::<Uri>()?, &with_referer);
    let resp = app.controller.update(&ctx, 1, &raw, &post, &FlashBag::peek(&*session))?.into_response_with(&*session);
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()), Some("/users?page=2"));
    assert_eq!(FlashBag::pull(&*session).get_str("success"), Some("User updated successfully."));

    let bare = RequestInfo::from_parts(&Method::POST, &"/users/1".parse::<Uri>()?, &headers);
    let outcome = app.controller.update(&ctx, 1, &raw, &bare, &FlashBag::peek(&*session))?;
    assert_eq!(outcome.location, "/users");
    Ok(())
}

#[test]
fn logout_expires_the_session_cookie() -> Result<()> {
    let app = app()?;
    let headers = login(&app);
    let session = Arc::new(session_from_headers(&app.sessions, &headers, &app.cfg.session));
    let mut auth = AuthenticationService::new(session.clone(), app.users.clone(), app.cfg.auth.clone());
    assert!(auth.is_authenticated());

    let resp = logout_response(&mut auth, "/", &app.cfg.session);
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = resp.headers().get(header::SET_COOKIE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(cookie.starts_with(&format!("{}=deleted;", app.cfg.session.cookie_name)));

    // the old cookie no longer carries a login
    let again = Arc::new(session_from_headers(&app.sessions, &headers, &app.cfg.session));
    assert!(!AuthenticationService::new(again, app.users.clone(), app.cfg.auth.clone()).is_authenticated());
    Ok(())
}
