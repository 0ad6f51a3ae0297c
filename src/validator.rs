//! Field and form validation against per-field rules.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{FieldDefinition, FieldType, FieldValue, ValidationErrorMap, ValueSet};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

// Leading numeric prefix, the way lenient float parsers read input.
static FLOAT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|\d+\.?\d*(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?)")
        .expect("float pattern compiles")
});

pub const EMAIL_MESSAGE: &str = "Please enter a valid email address";
pub const PASSWORD_MESSAGE: &str =
    "Password must be at least 8 characters and contain at least one number";

const MIN_PASSWORD_LENGTH: usize = 8;

/// One validation rule with its parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationRule {
    Email,
    Password,
    MinLength(usize),
    MaxLength(usize),
    MinValue(f64),
    MaxValue(f64),
    MinDigits(usize),
    MaxDigits(usize),
}

impl ValidationRule {
    /// Serialized rule name.
    pub fn name(&self) -> &'static str {
        match self {
            ValidationRule::Email => "email",
            ValidationRule::Password => "password",
            ValidationRule::MinLength(_) => "minLength",
            ValidationRule::MaxLength(_) => "maxLength",
            ValidationRule::MinValue(_) => "minValue",
            ValidationRule::MaxValue(_) => "maxValue",
            ValidationRule::MinDigits(_) => "minDigits",
            ValidationRule::MaxDigits(_) => "maxDigits",
        }
    }

    /// Whether an authoring UI offers this rule for `field_type`.
    pub fn applies_to(&self, field_type: FieldType) -> bool {
        match self {
            ValidationRule::Email | ValidationRule::Password => field_type == FieldType::Text,
            ValidationRule::MinLength(_) | ValidationRule::MaxLength(_) => field_type.is_textual(),
            ValidationRule::MinValue(_)
            | ValidationRule::MaxValue(_)
            | ValidationRule::MinDigits(_)
            | ValidationRule::MaxDigits(_) => field_type == FieldType::Number,
        }
    }
}

/// Rules present on `field`, in evaluation order.
pub fn field_rules(field: &FieldDefinition) -> Vec<ValidationRule> {
    let v = &field.validation;
    let mut rules = Vec::new();
    if v.email {
        rules.push(ValidationRule::Email);
    }
    if v.password {
        rules.push(ValidationRule::Password);
    }
    rules.extend(v.min_length.map(ValidationRule::MinLength));
    rules.extend(v.max_length.map(ValidationRule::MaxLength));
    rules.extend(v.min_value.map(ValidationRule::MinValue));
    rules.extend(v.max_value.map(ValidationRule::MaxValue));
    rules.extend(v.min_digits.map(ValidationRule::MinDigits));
    rules.extend(v.max_digits.map(ValidationRule::MaxDigits));
    rules
}

/// Validate one value against its field definition.
///
/// Returns every violated rule message in evaluation order. A required field
/// with a blank value yields only the "is required" message; a blank
/// optional value is valid.
pub fn validate_field(value: &FieldValue, field: &FieldDefinition) -> Vec<String> {
    let mut errors = Vec::new();
    let label = &field.label;
    let rules = &field.validation;

    if value.is_blank() {
        if field.required {
            errors.push(format!("{} is required", label));
        }
        return errors;
    }

    let text = value.as_text();

    if rules.email && field.field_type == FieldType::Text && !EMAIL_RE.is_match(&text) {
        errors.push(EMAIL_MESSAGE.to_string());
    }

    if rules.password && field.field_type == FieldType::Text && !is_strong_password(&text) {
        errors.push(PASSWORD_MESSAGE.to_string());
    }

    let length = text.chars().count();
    if let Some(min) = positive(rules.min_length) {
        if length < min {
            errors.push(format!("{} must be at least {} characters", label, min));
        }
    }
    if let Some(max) = positive(rules.max_length) {
        if length > max {
            errors.push(format!("{} must be no more than {} characters", label, max));
        }
    }

    if field.field_type == FieldType::Number {
        match parse_float(&text) {
            None => errors.push(format!("{} must be a valid number", label)),
            Some(n) => {
                if let Some(min) = rules.min_value {
                    if n < min {
                        errors.push(format!("{} must be at least {}", label, min));
                    }
                }
                if let Some(max) = rules.max_value {
                    if n > max {
                        errors.push(format!("{} must be no more than {}", label, max));
                    }
                }
            }
        }
    }

    let min_digits = positive(rules.min_digits);
    let max_digits = positive(rules.max_digits);
    if min_digits.is_some() || max_digits.is_some() {
        let digits = count_digits(&text);
        if let Some(min) = min_digits {
            if digits < min {
                errors.push(format!("{} must contain at least {} digits", label, min));
            }
        }
        if let Some(max) = max_digits {
            if digits > max {
                errors.push(format!("{} must contain no more than {} digits", label, max));
            }
        }
    }

    errors
}

/// Validate every editable field of a form.
///
/// Keeps only the first message per field. Derived fields are skipped.
pub fn validate_form(values: &ValueSet, fields: &[FieldDefinition]) -> ValidationErrorMap {
    let mut errors = ValidationErrorMap::new();

    for field in fields.iter().filter(|f| !f.is_derived) {
        let value = values.get(&field.id).unwrap_or(&FieldValue::Empty);
        if let Some(first) = validate_field(value, field).into_iter().next() {
            errors.insert(field.id.clone(), first);
        }
    }

    errors
}

/// Check a single rule in isolation. Blank values always pass.
pub fn validate_rule(rule: ValidationRule, value: &FieldValue) -> bool {
    if value.is_blank() {
        return true;
    }
    let text = value.as_text();

    match rule {
        ValidationRule::Email => EMAIL_RE.is_match(&text),
        ValidationRule::Password => is_strong_password(&text),
        ValidationRule::MinLength(min) => text.chars().count() >= min,
        ValidationRule::MaxLength(max) => text.chars().count() <= max,
        ValidationRule::MinValue(min) => parse_float(&text).is_some_and(|n| n >= min),
        ValidationRule::MaxValue(max) => parse_float(&text).is_some_and(|n| n <= max),
        ValidationRule::MinDigits(min) => count_digits(&text) >= min,
        ValidationRule::MaxDigits(max) => count_digits(&text) <= max,
    }
}

pub fn has_validation_errors(errors: &ValidationErrorMap) -> bool {
    !errors.is_empty()
}

pub fn get_field_error<'a>(field_id: &str, errors: &'a ValidationErrorMap) -> Option<&'a str> {
    errors.get(field_id).map(String::as_str)
}

/// Parse the leading number of `s`, ignoring trailing garbage.
///
/// `"12abc"` reads as 12; input with no numeric prefix yields `None`.
pub fn parse_float(s: &str) -> Option<f64> {
    let m = FLOAT_PREFIX_RE.find(s.trim_start())?;
    let digits = m.as_str();
    match digits.trim_start_matches(['+', '-']) {
        "Infinity" if digits.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => digits.parse().ok(),
    }
}

fn is_strong_password(s: &str) -> bool {
    s.chars().count() >= MIN_PASSWORD_LENGTH && s.chars().any(|c| c.is_ascii_digit())
}

fn count_digits(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

// Zero limits are treated as unset.
fn positive(limit: Option<usize>) -> Option<usize> {
    limit.filter(|n| *n > 0)
}
