//! Rule execution.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::input::{InputMap, InputValue, UploadedFile};
use super::messages::{attribute_label, format_number, render, template_for, Attributes, Messages, Placeholders, SizeKind};
use super::presence::PresenceVerifier;
use super::result::{ValidatedData, ValidationResult};
use super::rules::{Rule, RuleSet};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$"#)
        .expect("email pattern compiles")
});

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(?:https?|ftp)://[^\s/$.?#][^\s]*$").expect("url pattern compiles")
});

const IMAGE_MIMES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/bmp", "image/svg+xml", "image/webp"];
const ACCEPTED: &[&str] = &["yes", "on", "1", "true"];

enum Outcome {
    Pass,
    Fail { kind: Option<SizeKind>, params: Placeholders },
}

impl Outcome {
    fn fail() -> Self { Outcome::Fail { kind: None, params: Placeholders::default() } }

    fn from_bool(ok: bool) -> Self { if ok { Outcome::Pass } else { Outcome::fail() } }
}

/// Per-field view handed to each rule check.
struct FieldCtx<'a> {
    field: &'a str,
    value: Option<&'a InputValue>,
    data: &'a InputMap,
    attributes: &'a Attributes,
    numeric: bool,
}

impl FieldCtx<'_> {
    fn filled(&self, key: &str) -> bool {
        self.data.get(key).map(|v| !v.is_blank()).unwrap_or(false)
    }

    fn labels(&self, fields: &[String]) -> String {
        fields.iter().map(|f| attribute_label(f, self.attributes)).collect::<Vec<_>>().join(" / ")
    }
}

/// Runs rule sets against input. Cheap to share; the presence verifier is the
/// only collaborator.
#[derive(Clone, Default)]
pub struct Validator {
    presence: Option<Arc<dyn PresenceVerifier>>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").field("presence", &self.presence.is_some()).finish()
    }
}

impl Validator {
    pub fn new() -> Self { Self::default() }

    pub fn with_presence_verifier(mut self, verifier: Arc<dyn PresenceVerifier>) -> Self {
        self.presence = Some(verifier);
        self
    }

    pub fn validate(&self, data: &InputMap, rules: &RuleSet, messages: &Messages, attributes: &Attributes) -> ValidationResult {
        let mut errors_by_field: BTreeMap<String, String> = BTreeMap::new();
        let mut errors: Vec<String> = Vec::new();

        for (field, field_rules) in rules.iter() {
            let value = data.get(field);
            if value.is_none() && field_rules.contains(&Rule::Sometimes) {
                continue;
            }
            let nullable = field_rules.contains(&Rule::Nullable);
            let bail = field_rules.contains(&Rule::Bail);
            let ctx = FieldCtx {
                field,
                value,
                data,
                attributes,
                numeric: field_rules.iter().any(|r| matches!(r, Rule::Numeric | Rule::Integer)),
            };

            for rule in field_rules.iter().filter(|r| !r.is_modifier()) {
                if !rule.is_implicit() && skips_optional(value, nullable) {
                    continue;
                }
                if let Outcome::Fail { kind, mut params } = self.check(rule, &ctx) {
                    params.other = params.other.map(|o| attribute_label(&o, attributes));
                    let template = template_for(field, rule.name(), kind, messages);
                    let message = render(&template, &attribute_label(field, attributes), &params);
                    errors_by_field.entry(field.to_string()).or_insert_with(|| message.clone());
                    errors.push(message);
                    if bail || rule.is_implicit() {
                        break;
                    }
                }
            }
        }

        if errors.is_empty() {
            let validated: InputMap = rules
                .iter()
                .filter_map(|(f, _)| data.get(f).map(|v| (f.to_string(), v.clone())))
                .collect();
            debug!(target: "validation", fields = rules.len(), validated = validated.len(), "validation passed");
            ValidationResult::Passed { validated: ValidatedData::new(validated) }
        } else {
            debug!(target: "validation", failed_fields = ?errors_by_field.keys().collect::<Vec<_>>(), "validation failed");
            ValidationResult::Failed { errors_by_field, errors }
        }
    }

    fn check(&self, rule: &Rule, ctx: &FieldCtx<'_>) -> Outcome {
        let value = ctx.value;
        let json = value.and_then(|v| v.as_json());
        let text = value.and_then(|v| v.as_str());
        let scalar = value.and_then(|v| v.scalar_string());

        match rule {
            Rule::Required => Outcome::from_bool(value.map(|v| !v.is_blank()).unwrap_or(false)),
            Rule::Filled => Outcome::from_bool(value.map(|v| !v.is_blank()).unwrap_or(true)),
            Rule::Present => Outcome::from_bool(value.is_some()),
            Rule::Accepted => Outcome::from_bool(is_accepted(json)),
            Rule::RequiredWith(others) => {
                let triggered = others.iter().any(|o| ctx.filled(o));
                with_values(!triggered || ctx.filled(ctx.field), ctx.labels(others))
            }
            Rule::RequiredWithout(others) => {
                let triggered = others.iter().any(|o| !ctx.filled(o));
                with_values(!triggered || ctx.filled(ctx.field), ctx.labels(others))
            }
            Rule::Nullable | Rule::Sometimes | Rule::Bail => Outcome::Pass,

            Rule::String => Outcome::from_bool(text.is_some()),
            Rule::Integer => Outcome::from_bool(json.map(is_integer).unwrap_or(false)),
            Rule::Numeric => Outcome::from_bool(json.and_then(as_number).is_some()),
            Rule::Boolean => Outcome::from_bool(json.map(is_boolean).unwrap_or(false)),
            Rule::Array => Outcome::from_bool(matches!(
                value,
                Some(InputValue::Json(Value::Array(_))) | Some(InputValue::Json(Value::Object(_))) | Some(InputValue::Files(_))
            )),
            Rule::Date => Outcome::from_bool(text.map(is_date).unwrap_or(false)),
            Rule::Json => Outcome::from_bool(text.map(|s| serde_json::from_str::<Value>(s).is_ok()).unwrap_or(false)),

            Rule::Email => Outcome::from_bool(text.map(|s| EMAIL_RE.is_match(s)).unwrap_or(false)),
            Rule::Url => Outcome::from_bool(text.map(|s| URL_RE.is_match(s)).unwrap_or(false)),
            Rule::Uuid => Outcome::from_bool(text.map(|s| s.len() == 36 && uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false)),
            Rule::Ip => Outcome::from_bool(text.map(|s| s.parse::<IpAddr>().is_ok()).unwrap_or(false)),
            Rule::Ipv4 => Outcome::from_bool(text.map(|s| s.parse::<Ipv4Addr>().is_ok()).unwrap_or(false)),
            Rule::Ipv6 => Outcome::from_bool(text.map(|s| s.parse::<Ipv6Addr>().is_ok()).unwrap_or(false)),
            Rule::Alpha => Outcome::from_bool(text.map(|s| s.chars().all(char::is_alphabetic)).unwrap_or(false)),
            Rule::AlphaNum => Outcome::from_bool(scalar.map(|s| s.chars().all(char::is_alphanumeric)).unwrap_or(false)),
            Rule::AlphaDash => Outcome::from_bool(
                scalar.map(|s| s.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')).unwrap_or(false),
            ),
            Rule::Regex(pattern) => Outcome::from_bool(scalar.map(|s| pattern.is_match(&s)).unwrap_or(false)),
            Rule::NotRegex(pattern) => Outcome::from_bool(scalar.map(|s| !pattern.is_match(&s)).unwrap_or(false)),
            Rule::StartsWith(prefixes) => with_values(
                scalar.map(|s| prefixes.iter().any(|p| s.starts_with(p.as_str()))).unwrap_or(false),
                prefixes.join(", "),
            ),
            Rule::EndsWith(suffixes) => with_values(
                scalar.map(|s| suffixes.iter().any(|p| s.ends_with(p.as_str()))).unwrap_or(false),
                suffixes.join(", "),
            ),
            Rule::Digits(n) => {
                let ok = scalar.map(|s| s.len() == *n && s.chars().all(|c| c.is_ascii_digit())).unwrap_or(false);
                let params = Placeholders { digits: Some(n.to_string()), ..Default::default() };
                if ok { Outcome::Pass } else { Outcome::Fail { kind: None, params } }
            }

            Rule::Min(min) => sized(ctx, |size| size >= *min, Placeholders { min: Some(format_number(*min)), ..Default::default() }),
            Rule::Max(max) => sized(ctx, |size| size <= *max, Placeholders { max: Some(format_number(*max)), ..Default::default() }),
            Rule::Between(min, max) => sized(
                ctx,
                |size| size >= *min && size <= *max,
                Placeholders { min: Some(format_number(*min)), max: Some(format_number(*max)), ..Default::default() },
            ),
            Rule::Size(n) => sized(ctx, |size| size == *n, Placeholders { size: Some(format_number(*n)), ..Default::default() }),

            Rule::In(list) => Outcome::from_bool(all_scalars(value).map(|vs| vs.iter().all(|v| list.contains(v))).unwrap_or(false)),
            Rule::NotIn(list) => Outcome::from_bool(all_scalars(value).map(|vs| vs.iter().all(|v| !list.contains(v))).unwrap_or(false)),
            Rule::Confirmed => Outcome::from_bool(value.is_some() && ctx.data.get(&format!("{}_confirmation", ctx.field)) == value),
            Rule::Same(other) => with_other(value.is_some() && ctx.data.get(other) == value, other),
            Rule::Different(other) => {
                // nothing to differ from when the other field is absent
                with_other(ctx.data.get(other).map_or(true, |theirs| Some(theirs) != value), other)
            }

            Rule::File => Outcome::from_bool(matches!(value, Some(InputValue::File(f)) if f.is_valid)),
            Rule::Image => Outcome::from_bool(
                files_of(value)
                    .map(|fs| fs.iter().all(|f| IMAGE_MIMES.contains(&f.mime_type.to_ascii_lowercase().as_str())))
                    .unwrap_or(false),
            ),
            Rule::Mimes(exts) => with_values(
                files_of(value).map(|fs| fs.iter().all(|f| extension_allowed(f, exts))).unwrap_or(false),
                exts.join(", "),
            ),
            Rule::MimeTypes(types) => with_values(
                files_of(value).map(|fs| fs.iter().all(|f| mime_allowed(&f.mime_type, types))).unwrap_or(false),
                types.join(", "),
            ),

            Rule::Unique { table, column, ignore } => match json {
                Some(v) => {
                    let column = column.as_deref().unwrap_or(ctx.field);
                    Outcome::from_bool(self.presence_check(table, column, v, ignore.as_deref()) == Some(false))
                }
                None => Outcome::fail(),
            },
            Rule::Exists { table, column } => match json {
                Some(v) => {
                    let column = column.as_deref().unwrap_or(ctx.field);
                    Outcome::from_bool(self.presence_check(table, column, v, None) == Some(true))
                }
                None => Outcome::fail(),
            },
            Rule::Unsupported(spec) => {
                error!(target: "validation", field = ctx.field, spec = %spec, "unsupported rule evaluated");
                Outcome::fail()
            }
        }
    }

    /// `None` when no verifier is configured or the lookup errored; both make
    /// the calling rule fail.
    fn presence_check(&self, table: &str, column: &str, value: &Value, ignore: Option<&str>) -> Option<bool> {
        let Some(verifier) = self.presence.as_ref() else {
            warn!(target: "validation", table, column, "presence rule used without a presence verifier");
            return None;
        };
        match verifier.exists(table, column, value, ignore) {
            Ok(found) => Some(found),
            Err(e) => {
                warn!(target: "validation", table, column, error = %e, "presence lookup failed");
                None
            }
        }
    }
}

fn skips_optional(value: Option<&InputValue>, nullable: bool) -> bool {
    match value {
        None => true,
        Some(InputValue::Json(Value::String(s))) => s.trim().is_empty(),
        Some(v) => nullable && v.is_null(),
    }
}

fn with_values(ok: bool, values: String) -> Outcome {
    if ok {
        Outcome::Pass
    } else {
        Outcome::Fail { kind: None, params: Placeholders { values: Some(values), ..Default::default() } }
    }
}

fn with_other(ok: bool, other: &str) -> Outcome {
    if ok {
        Outcome::Pass
    } else {
        Outcome::Fail { kind: None, params: Placeholders { other: Some(other.to_string()), ..Default::default() } }
    }
}

fn sized(ctx: &FieldCtx<'_>, test: impl Fn(f64) -> bool, params: Placeholders) -> Outcome {
    match measure(ctx.value, ctx.numeric) {
        Some((size, _)) if test(size) => Outcome::Pass,
        Some((_, kind)) => Outcome::Fail { kind: Some(kind), params },
        None => Outcome::Fail { kind: None, params },
    }
}

/// Size of a value: numbers by value (JSON numbers always, numeric strings
/// when the field is declared numeric), files in kilobytes, collections by
/// length and strings by character count.
fn measure(value: Option<&InputValue>, numeric: bool) -> Option<(f64, SizeKind)> {
    match value? {
        InputValue::File(f) => Some((f.size_kb(), SizeKind::File)),
        InputValue::Files(fs) => Some((fs.len() as f64, SizeKind::Array)),
        InputValue::Json(Value::Number(n)) => n.as_f64().map(|n| (n, SizeKind::Numeric)),
        InputValue::Json(Value::String(s)) => {
            if numeric {
                if let Ok(n) = s.trim().parse::<f64>() {
                    return Some((n, SizeKind::Numeric));
                }
            }
            Some((s.chars().count() as f64, SizeKind::String))
        }
        InputValue::Json(Value::Array(a)) => Some((a.len() as f64, SizeKind::Array)),
        InputValue::Json(Value::Object(o)) => Some((o.len() as f64, SizeKind::Array)),
        InputValue::Json(_) => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_integer(v: &Value) -> bool {
    match v {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(v: &Value) -> bool {
    match v {
        Value::Bool(_) => true,
        Value::Number(n) => n.as_i64().map(|i| i == 0 || i == 1).unwrap_or(false),
        Value::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

fn is_accepted(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => ACCEPTED.contains(&s.to_ascii_lowercase().as_str()),
        _ => false,
    }
}

fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}

fn all_scalars(value: Option<&InputValue>) -> Option<Vec<String>> {
    match value? {
        InputValue::Json(Value::Array(items)) => items.iter().map(|i| InputValue::Json(i.clone()).scalar_string()).collect(),
        v => v.scalar_string().map(|s| vec![s]),
    }
}

fn files_of(value: Option<&InputValue>) -> Option<Vec<&UploadedFile>> {
    match value? {
        InputValue::File(f) => Some(vec![f]),
        InputValue::Files(fs) if !fs.is_empty() => Some(fs.iter().collect()),
        _ => None,
    }
}

fn extension_allowed(file: &UploadedFile, allowed: &[String]) -> bool {
    let Some(ext) = file.extension() else { return false };
    allowed.iter().any(|a| {
        a == &ext || (matches!(a.as_str(), "jpg" | "jpeg") && matches!(ext.as_str(), "jpg" | "jpeg"))
    })
}

fn mime_allowed(mime: &str, allowed: &[String]) -> bool {
    let mime = mime.to_ascii_lowercase();
    allowed.iter().any(|a| match a.strip_suffix("/*") {
        Some(prefix) => mime.split_once('/').map(|(top, _)| top == prefix).unwrap_or(false),
        None => *a == mime,
    })
}
