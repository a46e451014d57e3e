//! Request validation: rule parsing, execution, messages and the form
//! request pipeline.

mod input;
mod rules;
mod messages;
mod presence;
mod result;
mod engine;
mod form_request;

pub use input::{normalize_files, InputMap, InputValue, RawFile, RawInput, RawUpload, UploadedFile};
pub use rules::{Pattern, Rule, RuleParseError, RuleSet};
pub use messages::{attribute_label, format_number, Attributes, Messages, Placeholders, SizeKind};
pub use presence::PresenceVerifier;
pub use result::{ValidatedData, ValidationResult};
pub use engine::Validator;
pub use form_request::{Flashed, DONT_FLASH, FormRequest, FormSubmission, RedirectSignal, RedirectTarget};
