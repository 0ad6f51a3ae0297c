//! Core types for form schemas, field values and validation results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of fields a single form may carry.
pub const MAX_FIELDS: usize = 50;

/// Bounds on a form's display name, in characters.
pub const MIN_FORM_NAME_LENGTH: usize = 1;
pub const MAX_FORM_NAME_LENGTH: usize = 100;

/// Field identifier, stable across edits of the same schema.
pub type FieldId = String;

/// Live mapping of field id to current value.
pub type ValueSet = BTreeMap<FieldId, FieldValue>;

/// First violated rule message per field.
pub type ValidationErrorMap = BTreeMap<FieldId, String>;

/// Input kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Date,
    ];

    /// Returns the serialized name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
        }
    }

    /// Parse a type from its serialized name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether the field needs a non-empty option list.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }

    /// Whether length rules make sense for this type.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Textarea)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single choice of a select or radio field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Per-field validation rules. Absent rules are not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_digits: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_digits: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub email: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub password: bool,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// How a derived field computes its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DerivedSpec {
    /// Whole years elapsed since the date held by `parent_field`.
    AgeFromDob {
        #[serde(rename = "parentField")]
        parent_field: FieldId,
    },
    /// First and last name joined by a single space.
    FullName {
        #[serde(rename = "firstNameField")]
        first_name_field: FieldId,
        #[serde(rename = "lastNameField")]
        last_name_field: FieldId,
    },
}

/// Kind of derivation, without its parent references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedKind {
    AgeFromDob,
    FullName,
}

impl DerivedKind {
    /// Field type every parent of this derivation must have.
    pub fn parent_type(&self) -> FieldType {
        match self {
            DerivedKind::AgeFromDob => FieldType::Date,
            DerivedKind::FullName => FieldType::Text,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DerivedKind::AgeFromDob => "Age from Date of Birth",
            DerivedKind::FullName => "Full Name from First and Last Name",
        }
    }
}

impl DerivedSpec {
    pub fn kind(&self) -> DerivedKind {
        match self {
            DerivedSpec::AgeFromDob { .. } => DerivedKind::AgeFromDob,
            DerivedSpec::FullName { .. } => DerivedKind::FullName,
        }
    }

    /// Ids of every field this derivation reads.
    pub fn parents(&self) -> Vec<&str> {
        match self {
            DerivedSpec::AgeFromDob { parent_field } => vec![parent_field.as_str()],
            DerivedSpec::FullName {
                first_name_field,
                last_name_field,
            } => vec![first_name_field.as_str(), last_name_field.as_str()],
        }
    }
}

/// A single field of a form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: FieldValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "ValidationRules::is_empty")]
    pub validation: ValidationRules,
    #[serde(default)]
    pub is_derived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_spec: Option<DerivedSpec>,
}

impl FieldDefinition {
    /// Create a plain editable field with no rules.
    pub fn new(id: impl Into<FieldId>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: label.into(),
            required: false,
            default_value: FieldValue::Empty,
            options: Vec::new(),
            validation: ValidationRules::default(),
            is_derived: false,
            derived_spec: None,
        }
    }

    /// Create a read-only field computed by `spec`.
    pub fn derived(
        id: impl Into<FieldId>,
        field_type: FieldType,
        label: impl Into<String>,
        spec: DerivedSpec,
    ) -> Self {
        Self {
            is_derived: true,
            derived_spec: Some(spec),
            ..Self::new(id, field_type, label)
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = value.into();
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_validation(mut self, validation: ValidationRules) -> Self {
        self.validation = validation;
        self
    }

    /// Value a fresh form instance starts with for this field.
    ///
    /// Derived fields start empty. An unset default (`null`, `""` or
    /// `false`) falls back to `false` for checkboxes and the empty string
    /// otherwise; any other default is copied as is.
    pub fn initial_value(&self) -> FieldValue {
        if self.is_derived {
            return FieldValue::Text(String::new());
        }
        match &self.default_value {
            FieldValue::Text(s) if !s.is_empty() => self.default_value.clone(),
            FieldValue::Bool(true) => self.default_value.clone(),
            _ => match self.field_type {
                FieldType::Checkbox => FieldValue::Bool(false),
                _ => FieldValue::Text(String::new()),
            },
        }
    }
}

/// A named, ordered list of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FormSchema {
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// A schema that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFormSchema {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

/// Partial update applied to a stored schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchemaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDefinition>>,
}

/// Value entered for, or computed into, a field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    #[default]
    Empty,
}

impl FieldValue {
    /// Textual form used by rules that inspect characters.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Bool(true) => "true".to_string(),
            FieldValue::Bool(false) | FieldValue::Empty => String::new(),
        }
    }

    /// Empty, `false`, or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty | FieldValue::Bool(false) => true,
            FieldValue::Bool(true) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}
