//! Error types for schema authoring, storage and form sessions.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{FieldDefinition, FieldType, ValidationErrorMap};

/// Schema authoring invariant violated. Blocks saving the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Field label is required")]
    BlankLabel { field: String },

    #[error("At least one option is required")]
    MissingOptions { field: String },

    #[error("Derived field type is required")]
    MissingDerivedSpec { field: String },

    #[error("Only derived fields can have a derived field type")]
    UnexpectedDerivedSpec { field: String },

    #[error("Selected parent field not found: {parent}")]
    UnknownParent { field: String, parent: String },

    #[error("Parent field '{parent}' is itself derived")]
    DerivedParent { field: String, parent: String },

    #[error("Parent field '{parent}' must be a {expected} field")]
    WrongParentType {
        field: String,
        parent: String,
        expected: FieldType,
    },

    #[error("A derived field cannot reference itself")]
    SelfReference { field: String },

    #[error("duplicate field id '{field}'")]
    DuplicateId { field: String },

    #[error("no field with id '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' is used by derived field '{dependent}'")]
    ParentInUse { field: String, dependent: String },

    #[error("a form can hold at most {max} fields")]
    TooManyFields { max: usize },

    #[error("Please add at least one field to save the form")]
    TooFewFields,

    #[error("{message}")]
    InvalidFormName { message: String },
}

impl ConfigError {
    /// Id of the offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::BlankLabel { field }
            | Self::MissingOptions { field }
            | Self::MissingDerivedSpec { field }
            | Self::UnexpectedDerivedSpec { field }
            | Self::UnknownParent { field, .. }
            | Self::DerivedParent { field, .. }
            | Self::WrongParentType { field, .. }
            | Self::SelfReference { field }
            | Self::DuplicateId { field }
            | Self::UnknownField { field }
            | Self::ParentInUse { field, .. } => Some(field.as_str()),
            Self::TooManyFields { .. } | Self::TooFewFields | Self::InvalidFormName { .. } => None,
        }
    }
}

/// Errors from a schema repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
}

impl RepositoryError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RepositoryError::InvalidJson { .. } => 2,
            _ => 3,
        }
    }
}

/// Errors while saving a schema from the builder.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SaveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SaveError::Config(_) => 2,
            SaveError::Repository(e) => e.exit_code(),
        }
    }
}

/// Single field validation failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    /// Id of the invalid field.
    pub field: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Flatten an error map into field errors, in the order of `fields`.
///
/// Ids with no matching field follow, in id order.
pub fn field_errors(errors: &ValidationErrorMap, fields: &[FieldDefinition]) -> Vec<FieldError> {
    let in_schema = fields.iter().map(|f| f.id.as_str());
    let unknown = errors
        .keys()
        .map(String::as_str)
        .filter(|id| !fields.iter().any(|f| f.id == *id));

    in_schema
        .chain(unknown)
        .filter_map(|id| {
            errors.get(id).map(|message| FieldError {
                field: id.to_string(),
                message: message.clone(),
            })
        })
        .collect()
}

/// Errors raised by a form session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no field with id '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' is derived and cannot be edited")]
    ReadOnlyField { field: String },

    #[error("a submission is already in progress")]
    SubmitInProgress,

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: ValidationErrorMap },

    #[error("submission failed: {message}")]
    Delivery { message: String },
}

impl SessionError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Invalid { .. } => 1,
            SessionError::Delivery { .. } => 3,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_error_exit_codes() {
        let err = RepositoryError::Read {
            path: PathBuf::from("forms.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.exit_code(), 3);

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RepositoryError::InvalidJson {
            path: PathBuf::from("forms.json"),
            source,
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn session_error_exit_codes() {
        let mut errors = ValidationErrorMap::new();
        errors.insert("email".into(), "Email is required".into());
        assert_eq!(SessionError::Invalid { errors }.exit_code(), 1);
        assert_eq!(SessionError::SubmitInProgress.exit_code(), 2);
        assert_eq!(
            SessionError::Delivery {
                message: "offline".into()
            }
            .exit_code(),
            3
        );
    }

    #[test]
    fn field_errors_follow_schema_order() {
        let fields = vec![
            FieldDefinition::new("zip", FieldType::Text, "Zip"),
            FieldDefinition::new("city", FieldType::Text, "City"),
            FieldDefinition::new("age", FieldType::Number, "Age"),
        ];
        let mut errors = ValidationErrorMap::new();
        errors.insert("age".into(), "Age must be a valid number".into());
        errors.insert("zip".into(), "Zip is required".into());
        errors.insert("stale".into(), "Stale is required".into());

        let ids: Vec<_> = field_errors(&errors, &fields)
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(ids, vec!["zip", "age", "stale"]);
    }

    #[test]
    fn config_error_messages() {
        let err = ConfigError::WrongParentType {
            field: "age".into(),
            parent: "name".into(),
            expected: FieldType::Date,
        };
        assert_eq!(err.to_string(), "Parent field 'name' must be a date field");
        assert_eq!(err.field(), Some("age"));
        assert_eq!(ConfigError::TooManyFields { max: 50 }.field(), None);
    }

    #[test]
    fn field_error_display() {
        let err = FieldError {
            field: "email".into(),
            message: "Please enter a valid email address".into(),
        };
        assert_eq!(err.to_string(), "email: Please enter a valid email address");
    }
}
