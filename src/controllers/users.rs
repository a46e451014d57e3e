use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::outcome::{ControllerError, ControllerOutcome};
use crate::authz::{authorize, Authorizer, GateArg};
use crate::identity::{hash_password, RequestContext, User, UserRepository, USERS_TABLE};
use crate::validation::{FormRequest, FormSubmission, InputMap, RawInput, Rule, RuleSet, ValidatedData, Validator};
use crate::web::{back_url, FlashBag, RequestInfo};

/// New user form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreUserRequest;

impl FormRequest for StoreUserRequest {
    fn rules(&self) -> RuleSet {
        RuleSet::new()
            .field("name", "required|string|max:255")
            .field("email", "required|email|unique:users,email")
            .field("password", "required|string|min:6")
    }
}

/// Edit form for an existing user; the email may stay the same.
#[derive(Debug, Clone, Copy)]
pub struct UpdateUserRequest {
    pub user_id: i64,
}

impl FormRequest for UpdateUserRequest {
    fn rules(&self) -> RuleSet {
        RuleSet::new()
            .field("name", "required|string|max:255")
            .rules("email", vec![Rule::Required, Rule::String, Rule::Email, Rule::unique(USERS_TABLE, "email").ignore(self.user_id)])
            .field("password", "string|min:6")
    }

    // an empty password means "keep the current one"
    fn prepare_for_validation(&self, data: &mut InputMap) {
        if data.get("password").map(|v| v.is_blank()).unwrap_or(false) {
            data.remove("password");
        }
    }
}

pub struct UserController {
    users: Arc<dyn UserRepository>,
    gate: Arc<dyn Authorizer>,
    validator: Arc<Validator>,
    index_location: String,
}

impl UserController {
    pub fn new(users: Arc<dyn UserRepository>, gate: Arc<dyn Authorizer>, validator: Arc<Validator>) -> Self {
        Self { users, gate, validator, index_location: "/users".to_string() }
    }

    pub fn with_index_location<S: Into<String>>(mut self, location: S) -> Self {
        self.index_location = location.into();
        self
    }

    fn find_or_redirect(&self, id: i64) -> Result<User, ControllerError> {
        self.users.find_by_id(id)?.ok_or_else(|| ControllerError::missing("User"))
    }

    fn validated<R: FormRequest>(&self, request: R, raw: &RawInput) -> Result<ValidatedData, ControllerError> {
        let form = FormSubmission::validate_request(request, raw, &self.validator)?;
        Ok(form.into_validated().unwrap_or_default())
    }

    pub fn store(&self, ctx: &RequestContext, raw: &RawInput) -> Result<ControllerOutcome, ControllerError> {
        let data = self.validated(StoreUserRequest, raw)?;
        authorize(self.gate.as_ref(), ctx, "create", vec![GateArg::type_of("user")])?;

        let hash = hash_password(data.str("password").unwrap_or_default())?;
        let user = User::new(0, data.str("email").unwrap_or_default())
            .with_password_hash(hash)
            .with_attr("name", data.get_or("name", Value::Null));
        let created = self.users.create(user)?;
        info!(target: "web", user_id = created.id, actor = ?ctx.actor_id(), "user created");
        Ok(ControllerOutcome::redirect(self.index_location.clone()).with_success("User created successfully."))
    }

    /// On success the client goes back (posted or flashed `back`, query
    /// `back`, referer) and falls back to the index.
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        raw: &RawInput,
        req: &RequestInfo,
        flashed: &FlashBag,
    ) -> Result<ControllerOutcome, ControllerError> {
        let mut user = self.find_or_redirect(id)?;
        let data = self.validated(UpdateUserRequest { user_id: id }, raw)?;
        authorize(self.gate.as_ref(), ctx, "update", vec![GateArg::subject(user.clone())])?;

        if let Some(email) = data.str("email") {
            user.email = email.to_string();
        }
        user.attributes.insert("name".to_string(), data.get_or("name", Value::Null));
        if let Some(password) = data.str("password") {
            user.password_hash = hash_password(password)?;
        }
        self.users.update(&user)?;
        info!(target: "web", user_id = id, actor = ?ctx.actor_id(), password_changed = data.contains("password"), "user updated");
        let location = if req.form.is_empty() {
            back_url(&req.clone().with_form(raw.fields.clone()), flashed, Some(&self.index_location))
        } else {
            back_url(req, flashed, Some(&self.index_location))
        };
        Ok(ControllerOutcome::redirect(location).with_success("User updated successfully."))
    }

    pub fn destroy(&self, ctx: &RequestContext, id: i64) -> Result<ControllerOutcome, ControllerError> {
        let user = self.find_or_redirect(id)?;
        authorize(self.gate.as_ref(), ctx, "delete", vec![GateArg::subject(user)])?;
        self.users.delete(id)?;
        info!(target: "web", user_id = id, actor = ?ctx.actor_id(), "user deleted");
        Ok(ControllerOutcome::redirect(self.index_location.clone()).with_success("User deleted successfully."))
    }
}
