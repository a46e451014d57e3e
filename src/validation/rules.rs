//! Declarative rule specifications.
//!
//! Rules are written the familiar way (`"required|string|max:255"`) and parsed
//! into [`Rule`] values once, when the rule set is built.

use std::fmt;

use regex::Regex;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("unknown validation rule '{0}'")]
    Unknown(String),
    #[error("rule '{rule}' expects {expected}")]
    BadParameters { rule: String, expected: &'static str },
}

/// A `regex` / `not_regex` pattern, compiled when the rule is parsed.
///
/// Accepts bare patterns or delimited `/body/flags` ones; `i`, `m`, `s` and
/// `x` flags become inline flags.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Pattern, regex::Error> {
        let delimited = source.strip_prefix('/').and_then(|rest| rest.rfind('/').map(|end| (&rest[..end], &rest[end + 1..])));
        let regex = match delimited {
            Some((body, flags)) => {
                let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's' | 'x')).collect();
                if inline.is_empty() { Regex::new(body)? } else { Regex::new(&format!("(?{inline}){body}"))? }
            }
            None => Regex::new(source)?,
        };
        Ok(Pattern { source: source.to_string(), regex })
    }

    pub fn as_str(&self) -> &str { &self.source }

    pub fn is_match(&self, value: &str) -> bool { self.regex.is_match(value) }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool { self.source == other.source }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

fn pattern(rule: &str, p: Option<&str>) -> Result<Pattern, RuleParseError> {
    let source = required_param(rule, p, "a pattern")?;
    Pattern::new(source).map_err(|e| {
        error!(target: "validation", rule, pattern = source, error = %e, "invalid regex rule");
        RuleParseError::BadParameters { rule: rule.to_string(), expected: "a valid regular expression" }
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    // presence / control
    Required,
    Filled,
    Present,
    Accepted,
    RequiredWith(Vec<String>),
    RequiredWithout(Vec<String>),
    Nullable,
    Sometimes,
    Bail,
    // type
    String,
    Integer,
    Numeric,
    Boolean,
    Array,
    Date,
    Json,
    // format
    Email,
    Url,
    Uuid,
    Ip,
    Ipv4,
    Ipv6,
    Alpha,
    AlphaNum,
    AlphaDash,
    Regex(Pattern),
    NotRegex(Pattern),
    StartsWith(Vec<String>),
    EndsWith(Vec<String>),
    Digits(usize),
    // size
    Min(f64),
    Max(f64),
    Between(f64, f64),
    Size(f64),
    // comparison
    In(Vec<String>),
    NotIn(Vec<String>),
    Confirmed,
    Same(String),
    Different(String),
    // files
    File,
    Image,
    Mimes(Vec<String>),
    MimeTypes(Vec<String>),
    // persistence
    Unique { table: String, column: Option<String>, ignore: Option<String> },
    Exists { table: String, column: Option<String> },
    /// Rule string that failed to parse. Always fails.
    Unsupported(String),
}

fn list(params: &str) -> Vec<String> {
    params.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn number(rule: &str, p: &str) -> Result<f64, RuleParseError> {
    p.trim().parse::<f64>().map_err(|_| RuleParseError::BadParameters { rule: rule.to_string(), expected: "a number" })
}

fn required_param<'a>(rule: &str, p: Option<&'a str>, expected: &'static str) -> Result<&'a str, RuleParseError> {
    match p.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(RuleParseError::BadParameters { rule: rule.to_string(), expected }),
    }
}

fn ignore_param(p: &str) -> Option<String> {
    let p = p.trim();
    let id = p.strip_prefix("ignore:").unwrap_or(p).trim();
    if id.is_empty() || id.eq_ignore_ascii_case("null") { None } else { Some(id.to_string()) }
}

impl Rule {
    /// Parse one rule spec such as `"max:255"` or `"unique:users,email,ignore:4"`.
    pub fn parse(spec: &str) -> Result<Rule, RuleParseError> {
        let spec = spec.trim();
        let (name, params) = match spec.split_once(':') {
            Some((n, p)) => (n.trim(), Some(p)),
            None => (spec, None),
        };
        let rule = match name {
            "required" => Rule::Required,
            "filled" => Rule::Filled,
            "present" => Rule::Present,
            "accepted" => Rule::Accepted,
            "required_with" => Rule::RequiredWith(list(required_param(name, params, "field names")?)),
            "required_without" => Rule::RequiredWithout(list(required_param(name, params, "field names")?)),
            "nullable" => Rule::Nullable,
            "sometimes" => Rule::Sometimes,
            "bail" => Rule::Bail,
            "string" => Rule::String,
            "integer" | "int" => Rule::Integer,
            "numeric" => Rule::Numeric,
            "boolean" | "bool" => Rule::Boolean,
            "array" => Rule::Array,
            "date" => Rule::Date,
            "json" => Rule::Json,
            "email" => Rule::Email,
            "url" => Rule::Url,
            "uuid" => Rule::Uuid,
            "ip" => Rule::Ip,
            "ipv4" => Rule::Ipv4,
            "ipv6" => Rule::Ipv6,
            "alpha" => Rule::Alpha,
            "alpha_num" => Rule::AlphaNum,
            "alpha_dash" => Rule::AlphaDash,
            // regex patterns may contain ':' and ','; keep the whole remainder
            "regex" => Rule::Regex(pattern(name, params)?),
            "not_regex" => Rule::NotRegex(pattern(name, params)?),
            "starts_with" => Rule::StartsWith(list(required_param(name, params, "prefixes")?)),
            "ends_with" => Rule::EndsWith(list(required_param(name, params, "suffixes")?)),
            "digits" => {
                let p = required_param(name, params, "a digit count")?;
                Rule::Digits(p.parse::<usize>().map_err(|_| RuleParseError::BadParameters { rule: name.to_string(), expected: "a digit count" })?)
            }
            "min" => Rule::Min(number(name, required_param(name, params, "a number")?)?),
            "max" => Rule::Max(number(name, required_param(name, params, "a number")?)?),
            "size" => Rule::Size(number(name, required_param(name, params, "a number")?)?),
            "between" => {
                let p = list(required_param(name, params, "min,max")?);
                if p.len() != 2 {
                    return Err(RuleParseError::BadParameters { rule: name.to_string(), expected: "min,max" });
                }
                Rule::Between(number(name, &p[0])?, number(name, &p[1])?)
            }
            "in" => Rule::In(list(params.unwrap_or(""))),
            "not_in" => Rule::NotIn(list(params.unwrap_or(""))),
            "confirmed" => Rule::Confirmed,
            "same" => Rule::Same(required_param(name, params, "a field name")?.to_string()),
            "different" => Rule::Different(required_param(name, params, "a field name")?.to_string()),
            "file" => Rule::File,
            "image" => Rule::Image,
            "mimes" => Rule::Mimes(list(required_param(name, params, "extensions")?).into_iter().map(|s| s.to_ascii_lowercase()).collect()),
            "mimetypes" => Rule::MimeTypes(list(required_param(name, params, "mime types")?).into_iter().map(|s| s.to_ascii_lowercase()).collect()),
            "unique" => {
                let p = list(required_param(name, params, "table[,column[,ignore]]")?);
                if p.is_empty() {
                    return Err(RuleParseError::BadParameters { rule: name.to_string(), expected: "table[,column[,ignore]]" });
                }
                Rule::Unique {
                    table: p[0].clone(),
                    column: p.get(1).filter(|c| !c.eq_ignore_ascii_case("null")).cloned(),
                    ignore: p.get(2).and_then(|s| ignore_param(s)),
                }
            }
            "exists" => {
                let p = list(required_param(name, params, "table[,column]")?);
                if p.is_empty() {
                    return Err(RuleParseError::BadParameters { rule: name.to_string(), expected: "table[,column]" });
                }
                Rule::Exists { table: p[0].clone(), column: p.get(1).cloned() }
            }
            other => return Err(RuleParseError::Unknown(other.to_string())),
        };
        Ok(rule)
    }

    /// Parse a pipe-joined list.
    pub fn parse_list(specs: &str) -> Result<Vec<Rule>, RuleParseError> {
        specs.split('|').map(str::trim).filter(|s| !s.is_empty()).map(Rule::parse).collect()
    }

    pub fn unique<S: Into<String>>(table: S, column: S) -> Rule {
        Rule::Unique { table: table.into(), column: Some(column.into()), ignore: None }
    }

    /// Exclude one record id from a `unique` check; no-op on other rules.
    pub fn ignore<I: ToString>(self, id: I) -> Rule {
        match self {
            Rule::Unique { table, column, .. } => Rule::Unique { table, column, ignore: Some(id.to_string()) },
            other => other,
        }
    }

    /// Implicit rules run even when the value is missing or blank.
    pub fn is_implicit(&self) -> bool {
        matches!(
            self,
            Rule::Required | Rule::Filled | Rule::Present | Rule::Accepted | Rule::RequiredWith(_) | Rule::RequiredWithout(_)
        )
    }

    /// Markers that change how other rules run but never fail themselves.
    pub fn is_modifier(&self) -> bool {
        matches!(self, Rule::Nullable | Rule::Sometimes | Rule::Bail)
    }

    /// Name used for message lookup (`"<field>.<name>"` / `"<name>"`).
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Filled => "filled",
            Rule::Present => "present",
            Rule::Accepted => "accepted",
            Rule::RequiredWith(_) => "required_with",
            Rule::RequiredWithout(_) => "required_without",
            Rule::Nullable => "nullable",
            Rule::Sometimes => "sometimes",
            Rule::Bail => "bail",
            Rule::String => "string",
            Rule::Integer => "integer",
            Rule::Numeric => "numeric",
            Rule::Boolean => "boolean",
            Rule::Array => "array",
            Rule::Date => "date",
            Rule::Json => "json",
            Rule::Email => "email",
            Rule::Url => "url",
            Rule::Uuid => "uuid",
            Rule::Ip => "ip",
            Rule::Ipv4 => "ipv4",
            Rule::Ipv6 => "ipv6",
            Rule::Alpha => "alpha",
            Rule::AlphaNum => "alpha_num",
            Rule::AlphaDash => "alpha_dash",
            Rule::Regex(_) => "regex",
            Rule::NotRegex(_) => "not_regex",
            Rule::StartsWith(_) => "starts_with",
            Rule::EndsWith(_) => "ends_with",
            Rule::Digits(_) => "digits",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Between(..) => "between",
            Rule::Size(_) => "size",
            Rule::In(_) => "in",
            Rule::NotIn(_) => "not_in",
            Rule::Confirmed => "confirmed",
            Rule::Same(_) => "same",
            Rule::Different(_) => "different",
            Rule::File => "file",
            Rule::Image => "image",
            Rule::Mimes(_) => "mimes",
            Rule::MimeTypes(_) => "mimetypes",
            Rule::Unique { .. } => "unique",
            Rule::Exists { .. } => "exists",
            Rule::Unsupported(_) => "unsupported",
        }
    }
}

/// Ordered field → rules mapping. Field order drives the order of the
/// unkeyed error list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    fields: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self { Self::default() }

    /// Add (or extend) a field from a pipe-joined spec. Unparseable entries
    /// are kept as [`Rule::Unsupported`] and logged.
    pub fn field(self, name: &str, specs: &str) -> Self {
        let rules = specs
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Rule::parse(s).unwrap_or_else(|e| {
                    error!(target: "validation", field = name, spec = s, error = %e, "invalid rule spec");
                    Rule::Unsupported(s.to_string())
                })
            })
            .collect();
        self.rules(name, rules)
    }

    /// Strict variant of [`RuleSet::field`].
    pub fn try_field(self, name: &str, specs: &str) -> Result<Self, RuleParseError> {
        Ok(self.rules(name, Rule::parse_list(specs)?))
    }

    pub fn rules(mut self, name: &str, rules: Vec<Rule>) -> Self {
        match self.fields.iter_mut().find(|(f, _)| f == name) {
            Some((_, existing)) => existing.extend(rules),
            None => self.fields.push((name.to_string(), rules)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&[Rule]> {
        self.fields.iter().find(|(f, _)| f == name).map(|(_, r)| r.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.fields.iter().map(|(f, r)| (f.as_str(), r.as_slice()))
    }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}
