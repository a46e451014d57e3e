//! Form request pipeline: bind input, prepare, validate, and hand back either
//! the validated submission or a redirect-back signal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use super::engine::Validator;
use super::input::{InputMap, RawInput};
use super::messages::{Attributes, Messages};
use super::result::{ValidatedData, ValidationResult};
use super::rules::RuleSet;

/// Fields never carried back as old input.
pub const DONT_FLASH: [&str; 3] = ["current_password", "password", "password_confirmation"];

/// A concrete form: its rules plus optional messages, labels and input
/// preparation.
pub trait FormRequest {
    fn rules(&self) -> RuleSet;

    fn messages(&self) -> Messages { Messages::new() }

    fn attributes(&self) -> Attributes { Attributes::new() }

    /// Adjust input before rules run (trim, drop empty optionals...).
    fn prepare_for_validation(&self, _data: &mut InputMap) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Back,
}

/// Data carried across the redirect for the next request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flashed {
    /// First message per field.
    pub errors: BTreeMap<String, String>,
    /// Posted fields, file uploads and [`DONT_FLASH`] keys excluded.
    pub input: BTreeMap<String, Value>,
}

/// Failed validation escalated to the boundary: "go back, with errors and
/// old input".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("validation failed for {} field(s)", .flashed.errors.len())]
pub struct RedirectSignal {
    pub redirect_target: RedirectTarget,
    pub flashed: Flashed,
}

impl RedirectSignal {
    pub fn back(errors: BTreeMap<String, String>, input: BTreeMap<String, Value>) -> Self {
        RedirectSignal { redirect_target: RedirectTarget::Back, flashed: Flashed { errors, input } }
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.flashed.errors.get(field).map(String::as_str)
    }
}

/// A bound and validated form. Validation runs once, in [`FormSubmission::new`].
#[derive(Debug, Clone)]
pub struct FormSubmission<R> {
    request: R,
    old_input: BTreeMap<String, Value>,
    data: InputMap,
    result: ValidationResult,
}

impl<R: FormRequest> FormSubmission<R> {
    pub fn new(request: R, raw: &RawInput, validator: &Validator) -> Self {
        let mut data = raw.collect();
        request.prepare_for_validation(&mut data);
        let old_input = raw
            .fields
            .iter()
            .filter(|(k, _)| !raw.files.contains_key(*k) && !DONT_FLASH.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let result = Self::run(&request, &data, validator);
        FormSubmission { request, old_input, data, result }
    }

    fn run(request: &R, data: &InputMap, validator: &Validator) -> ValidationResult {
        validator.validate(data, &request.rules(), &request.messages(), &request.attributes())
    }

    /// Re-run the rules against the current data; returns whether they pass.
    pub fn validate(&mut self, validator: &Validator) -> bool {
        self.result = Self::run(&self.request, &self.data, validator);
        self.result.success()
    }

    /// Bind, validate and escalate a failure to a redirect-back signal.
    pub fn validate_request(request: R, raw: &RawInput, validator: &Validator) -> Result<Self, RedirectSignal> {
        let submission = Self::new(request, raw, validator);
        match submission.redirect_signal() {
            Some(signal) => {
                info!(target: "validation", fields = ?signal.flashed.errors.keys().collect::<Vec<_>>(), "form rejected, redirecting back");
                Err(signal)
            }
            None => Ok(submission),
        }
    }

    pub fn fails(&self) -> bool { !self.result.success() }

    pub fn passes(&self) -> bool { self.result.success() }

    pub fn validated(&self) -> Option<&ValidatedData> { self.result.validated() }

    pub fn into_validated(self) -> Option<ValidatedData> {
        match self.result {
            ValidationResult::Passed { validated } => Some(validated),
            ValidationResult::Failed { .. } => None,
        }
    }

    /// First error per field; empty when validation passed.
    pub fn errors(&self) -> BTreeMap<String, String> {
        self.result.errors_by_field().cloned().unwrap_or_default()
    }

    pub fn all_errors(&self) -> &[String] { self.result.errors() }

    pub fn data(&self) -> &InputMap { &self.data }

    /// Replace the data, e.g. before calling [`FormSubmission::validate`] again.
    pub fn set_data(&mut self, data: InputMap) { self.data = data; }

    pub fn result(&self) -> &ValidationResult { &self.result }

    pub fn request(&self) -> &R { &self.request }

    pub fn old_input(&self) -> &BTreeMap<String, Value> { &self.old_input }

    pub fn redirect_signal(&self) -> Option<RedirectSignal> {
        if self.passes() {
            return None;
        }
        Some(RedirectSignal::back(self.errors(), self.old_input.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{InputValue, RawFile, RawUpload};
    use serde_json::json;
    use std::path::PathBuf;

    #[derive(Debug)]
    struct Signup;

    impl FormRequest for Signup {
        fn rules(&self) -> RuleSet {
            RuleSet::new().field("name", "required|string|max:10").field("avatar", "nullable|image")
        }

        fn prepare_for_validation(&self, data: &mut InputMap) {
            if let Some(InputValue::Json(Value::String(s))) = data.get_mut("name") {
                *s = s.trim().to_string();
            }
        }
    }

    fn broken_upload() -> RawUpload {
        RawUpload::Single(RawFile {
            client_name: "a.png".into(),
            client_mime_type: "image/png".into(),
            size_bytes: 10,
            temp_path: PathBuf::from("/tmp/a"),
            error: Some("partial".into()),
        })
    }

    #[test]
    fn prepare_runs_before_rules() {
        let raw = RawInput::new().field("name", json!("  Ann  ")).field("extra", json!(1));
        let sub = FormSubmission::new(Signup, &raw, &Validator::new());
        assert!(sub.passes());
        assert_eq!(sub.validated().unwrap().str("name"), Some("Ann"));
        assert!(!sub.validated().unwrap().contains("extra"));
    }

    #[test]
    fn invalid_upload_is_null_and_nullable_passes() {
        let raw = RawInput::new().field("name", json!("Ann")).file("avatar", broken_upload());
        let sub = FormSubmission::new(Signup, &raw, &Validator::new());
        assert!(sub.data()["avatar"].is_null());
        assert!(sub.passes());
    }

    #[test]
    fn validate_request_signals_redirect_back() {
        let raw = RawInput::new()
            .field("name", json!("much too long a name"))
            .field("avatar", json!("shadowed"))
            .file("avatar", broken_upload());
        let signal = FormSubmission::validate_request(Signup, &raw, &Validator::new()).unwrap_err();
        assert_eq!(signal.redirect_target, RedirectTarget::Back);
        assert_eq!(signal.error("name"), Some("The name may not be greater than 10 characters."));
        assert_eq!(signal.flashed.input.get("name"), Some(&json!("much too long a name")));
        assert!(!signal.flashed.input.contains_key("avatar"));
        let wire = serde_json::to_value(&signal).unwrap();
        assert_eq!(wire["redirect_target"], json!("back"));
    }

    #[test]
    fn passwords_are_not_flashed_as_old_input() {
        let raw = RawInput::new()
            .field("name", json!(""))
            .field("password", json!("hunter22"))
            .field("password_confirmation", json!("hunter22"))
            .field("current_password", json!("old-secret"));
        let signal = FormSubmission::validate_request(Signup, &raw, &Validator::new()).unwrap_err();
        assert_eq!(signal.flashed.input.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn revalidate_after_set_data() {
        let raw = RawInput::new();
        let validator = Validator::new();
        let mut sub = FormSubmission::new(Signup, &raw, &validator);
        assert!(sub.fails());
        assert_eq!(sub.errors().get("name").map(String::as_str), Some("The name field is required."));
        let mut data = InputMap::new();
        data.insert("name".into(), InputValue::from("Bo"));
        sub.set_data(data);
        assert!(sub.validate(&validator));
        assert!(sub.into_validated().is_some());
    }
}
