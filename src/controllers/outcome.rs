use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;
use crate::identity::SessionStore;
use crate::validation::RedirectSignal;
use crate::web::{flash, redirect_back, see_other};

/// Successful controller action: where to go next and what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOutcome {
    pub location: String,
    pub flash_success: Option<String>,
}

impl ControllerOutcome {
    pub fn redirect<S: Into<String>>(location: S) -> Self {
        ControllerOutcome { location: location.into(), flash_success: None }
    }

    pub fn with_success<S: Into<String>>(mut self, message: S) -> Self {
        self.flash_success = Some(message.into());
        self
    }

    pub fn into_response_with(self, session: &dyn SessionStore) -> Response {
        if let Some(msg) = self.flash_success {
            flash(session, "success", Value::String(msg));
        }
        see_other(&self.location)
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] RedirectSignal),
    #[error(transparent)]
    App(#[from] AppError),
    /// The addressed record does not exist; the user is sent back with the
    /// message flashed under `error`.
    #[error("{message}")]
    Missing { message: String },
}

impl From<anyhow::Error> for ControllerError {
    fn from(e: anyhow::Error) -> Self { ControllerError::App(AppError::from(e)) }
}

impl ControllerError {
    /// Missing record for `what` ("User" gives "User not found").
    pub fn missing(what: &str) -> Self {
        ControllerError::Missing { message: format!("{what} not found") }
    }

    /// Validation failures and missing records go back to `back_location`
    /// with flashed data; everything else renders as a JSON error.
    pub fn into_response_with(self, session: &dyn SessionStore, back_location: &str) -> Response {
        match self {
            ControllerError::Validation(signal) => redirect_back(&signal, session, back_location),
            ControllerError::Missing { message } => {
                flash(session, "error", Value::String(message));
                see_other(back_location)
            }
            ControllerError::App(e) => e.into_response(),
        }
    }
}
