//! Error message lookup and placeholder rendering.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;

/// Custom messages keyed `"<field>.<rule>"` or `"<rule>"`.
pub type Messages = BTreeMap<String, String>;
/// Human labels for fields, substituted for `:attribute`.
pub type Attributes = BTreeMap<String, String>;

/// What a size rule measured; picks the message variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKind {
    Numeric,
    File,
    Array,
    String,
}

impl SizeKind {
    fn suffix(self) -> &'static str {
        match self {
            SizeKind::Numeric => "numeric",
            SizeKind::File => "file",
            SizeKind::Array => "array",
            SizeKind::String => "string",
        }
    }
}

static DEFAULTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("required", "The :attribute field is required."),
        ("filled", "The :attribute field must have a value."),
        ("present", "The :attribute field must be present."),
        ("accepted", "The :attribute must be accepted."),
        ("required_with", "The :attribute field is required when :values is present."),
        ("required_without", "The :attribute field is required when :values is not present."),
        ("string", "The :attribute must be a string."),
        ("integer", "The :attribute must be an integer."),
        ("numeric", "The :attribute must be a number."),
        ("boolean", "The :attribute field must be true or false."),
        ("array", "The :attribute must be an array."),
        ("date", "The :attribute is not a valid date."),
        ("json", "The :attribute must be a valid JSON string."),
        ("email", "The :attribute must be a valid email address."),
        ("url", "The :attribute format is invalid."),
        ("uuid", "The :attribute must be a valid UUID."),
        ("ip", "The :attribute must be a valid IP address."),
        ("ipv4", "The :attribute must be a valid IPv4 address."),
        ("ipv6", "The :attribute must be a valid IPv6 address."),
        ("alpha", "The :attribute may only contain letters."),
        ("alpha_num", "The :attribute may only contain letters and numbers."),
        ("alpha_dash", "The :attribute may only contain letters, numbers, dashes and underscores."),
        ("regex", "The :attribute format is invalid."),
        ("not_regex", "The :attribute format is invalid."),
        ("starts_with", "The :attribute must start with one of the following: :values."),
        ("ends_with", "The :attribute must end with one of the following: :values."),
        ("digits", "The :attribute must be :digits digits."),
        ("min.numeric", "The :attribute must be at least :min."),
        ("min.file", "The :attribute must be at least :min kilobytes."),
        ("min.string", "The :attribute must be at least :min characters."),
        ("min.array", "The :attribute must have at least :min items."),
        ("max.numeric", "The :attribute may not be greater than :max."),
        ("max.file", "The :attribute may not be greater than :max kilobytes."),
        ("max.string", "The :attribute may not be greater than :max characters."),
        ("max.array", "The :attribute may not have more than :max items."),
        ("between.numeric", "The :attribute must be between :min and :max."),
        ("between.file", "The :attribute must be between :min and :max kilobytes."),
        ("between.string", "The :attribute must be between :min and :max characters."),
        ("between.array", "The :attribute must have between :min and :max items."),
        ("size.numeric", "The :attribute must be :size."),
        ("size.file", "The :attribute must be :size kilobytes."),
        ("size.string", "The :attribute must be :size characters."),
        ("size.array", "The :attribute must contain :size items."),
        ("in", "The selected :attribute is invalid."),
        ("not_in", "The selected :attribute is invalid."),
        ("confirmed", "The :attribute confirmation does not match."),
        ("same", "The :attribute and :other must match."),
        ("different", "The :attribute and :other must be different."),
        ("file", "The :attribute must be a file."),
        ("image", "The :attribute must be an image."),
        ("mimes", "The :attribute must be a file of type: :values."),
        ("mimetypes", "The :attribute must be a file of type: :values."),
        ("unique", "The :attribute has already been taken."),
        ("exists", "The selected :attribute is invalid."),
        ("unsupported", "The :attribute has an invalid validation rule."),
    ])
});

/// Values substituted into a template besides `:attribute`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placeholders {
    pub min: Option<String>,
    pub max: Option<String>,
    pub size: Option<String>,
    pub values: Option<String>,
    pub other: Option<String>,
    pub digits: Option<String>,
}

/// Label if one was supplied, otherwise the field name with underscores
/// turned into spaces.
pub fn attribute_label(field: &str, attributes: &Attributes) -> String {
    attributes.get(field).cloned().unwrap_or_else(|| field.replace('_', " "))
}

/// Renders numbers the way people write them: `255`, not `255.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Template for `rule` on `field`: custom `"<field>.<rule>"`, then custom
/// `"<rule>"`, then the built-in table.
pub fn template_for(field: &str, rule: &str, kind: Option<SizeKind>, custom: &Messages) -> String {
    if let Some(m) = custom.get(&format!("{field}.{rule}")) {
        return m.clone();
    }
    if let Some(m) = custom.get(rule) {
        return m.clone();
    }
    let key = match kind {
        Some(k) => format!("{rule}.{}", k.suffix()),
        None => rule.to_string(),
    };
    DEFAULTS
        .get(key.as_str())
        .or_else(|| DEFAULTS.get(rule))
        .copied()
        .unwrap_or("The :attribute is invalid.")
        .to_string()
}

pub fn render(template: &str, attribute: &str, p: &Placeholders) -> String {
    let mut out = template.replace(":attribute", attribute);
    let pairs = [
        (":min", &p.min),
        (":max", &p.max),
        (":size", &p.size),
        (":values", &p.values),
        (":other", &p.other),
        (":digits", &p.digits),
    ];
    for (token, value) in pairs {
        if let Some(v) = value {
            out = out.replace(token, v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_lookup_order() {
        let mut custom = Messages::new();
        custom.insert("required".into(), "Need :attribute".into());
        assert_eq!(template_for("email", "required", None, &custom), "Need :attribute");
        custom.insert("email.required".into(), "Email please".into());
        assert_eq!(template_for("email", "required", None, &custom), "Email please");
        assert_eq!(template_for("name", "required", None, &custom), "Need :attribute");
        assert_eq!(template_for("name", "email", None, &custom), "The :attribute must be a valid email address.");
    }

    #[test]
    fn size_variants() {
        let none = Messages::new();
        assert_eq!(template_for("x", "max", Some(SizeKind::String), &none), "The :attribute may not be greater than :max characters.");
        assert_eq!(template_for("x", "min", Some(SizeKind::File), &none), "The :attribute must be at least :min kilobytes.");
    }

    #[test]
    fn renders_placeholders() {
        let p = Placeholders { max: Some(format_number(255.0)), ..Default::default() };
        let label = attribute_label("first_name", &Attributes::new());
        assert_eq!(
            render("The :attribute may not be greater than :max characters.", &label, &p),
            "The first name may not be greater than 255 characters."
        );
        let mut attrs = Attributes::new();
        attrs.insert("first_name".into(), "given name".into());
        assert_eq!(attribute_label("first_name", &attrs), "given name");
        assert_eq!(format_number(2.5), "2.5");
    }
}
