//! Where "back" points: previous-URL tracking and back-URL resolution.

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap, Method, Uri};
use serde_json::Value;

use super::flash::FlashBag;
use crate::config::NavigationConfig;
use crate::identity::SessionStore;

/// The parts of a request navigation cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Posted form fields.
    pub form: BTreeMap<String, Value>,
    pub referer: Option<String>,
    pub is_ajax: bool,
}

impl RequestInfo {
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path.to_string(), None),
        };
        RequestInfo { method, path, query, form: BTreeMap::new(), referer: None, is_ajax: false }
    }

    pub fn from_parts(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        RequestInfo {
            method: method.clone(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            form: BTreeMap::new(),
            referer: headers.get(header::REFERER).and_then(|v| v.to_str().ok()).map(str::to_string),
            is_ajax: headers
                .get("x-requested-with")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
                .unwrap_or(false),
        }
    }

    pub fn with_form(mut self, form: BTreeMap<String, Value>) -> Self {
        self.form = form;
        self
    }

    pub fn with_referer<S: Into<String>>(mut self, referer: S) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// First value of a query parameter. Values are taken verbatim, without
    /// percent-decoding.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .as_deref()?
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    pub fn current_url(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }
}

/// Remember the current URL as "previous" for full-page GETs.
pub fn track_previous(session: &dyn SessionStore, req: &RequestInfo, cfg: &NavigationConfig) {
    if req.method != Method::GET || req.is_ajax {
        return;
    }
    session.set(&cfg.previous_url_key, Value::String(req.current_url()));
}

pub fn previous_url(session: &dyn SessionStore, cfg: &NavigationConfig) -> Option<String> {
    session.get(&cfg.previous_url_key).and_then(|v| v.as_str().map(str::to_string))
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Resolve the "back" location: posted `back`, flashed old `back`, query
/// `back`, the referer, then `default`, then the current URL.
pub fn back_url(req: &RequestInfo, flash: &FlashBag, default: Option<&str>) -> String {
    let posted = if req.method == Method::POST { non_empty(req.form.get("back").and_then(Value::as_str)) } else { None };
    posted
        .or_else(|| non_empty(flash.old_str("back")))
        .or_else(|| non_empty(req.query_param("back")))
        .or_else(|| non_empty(req.referer.as_deref()))
        .or_else(|| non_empty(default))
        .unwrap_or_else(|| req.current_url())
}
