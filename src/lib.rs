//! Form Schema Engine
//!
//! Typed form schemas with derived fields and per-field validation.
//!
//! A schema is an ordered list of [`FieldDefinition`]s. Some fields are
//! *derived*: their value is computed from other fields and never edited
//! directly. A [`FormSession`] holds the live values of one form instance,
//! recomputes derived fields on every change and validates on submit.
//!
//! # Example
//!
//! ```
//! use form_schema::{DerivedSpec, FieldDefinition, FieldType, FieldValue, FormSession};
//!
//! let fields = vec![
//!     FieldDefinition::new("first", FieldType::Text, "First name").required(true),
//!     FieldDefinition::new("last", FieldType::Text, "Last name"),
//!     FieldDefinition::derived(
//!         "full",
//!         FieldType::Text,
//!         "Full name",
//!         DerivedSpec::FullName {
//!             first_name_field: "first".into(),
//!             last_name_field: "last".into(),
//!         },
//!     ),
//! ];
//!
//! let mut session = FormSession::new(fields);
//! session.set_value("first", "Ada").unwrap();
//! session.set_value("last", "Lovelace").unwrap();
//!
//! assert_eq!(session.value("full"), Some(&FieldValue::from("Ada Lovelace")));
//! ```
//!
//! # Validation order
//!
//! | Step | Rule | Applies to |
//! |------|------|------------|
//! | 1 | `required` (stops here if blank) | any editable field |
//! | 2 | `email` | `text` |
//! | 3 | `password` | `text` |
//! | 4 | `minLength`, `maxLength` | any |
//! | 5 | number parse, then `minValue`, `maxValue` | `number` |
//! | 6 | `minDigits`, `maxDigits` | any |
//!
//! [`validate_form`] keeps the first message per field and never reports
//! derived fields.

mod builder;
mod config;
mod derive;
mod error;
mod linter;
mod repository;
mod session;
mod types;
mod validator;

pub use builder::{
    add_field, delete_field, move_field_down, move_field_up, new_field, reorder_fields,
    update_field, FormBuilder,
};
pub use config::{
    config_errors, get_available_parent_fields, validate_config, validate_derived_spec,
    validate_form_name, validate_schema,
};
pub use derive::{
    age_on, compute_derived_value, parse_date, update_derived_fields, Clock, FixedClock,
    SystemClock,
};
pub use error::{
    field_errors, ConfigError, FieldError, RepositoryError, SaveError, SessionError,
};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use repository::{
    load_schema_file, load_values_file, InMemoryRepository, JsonFileRepository, SchemaRepository,
};
pub use session::{DeliveryError, FormSession, SessionState, SubmitHandler};
pub use types::{
    DerivedKind, DerivedSpec, FieldDefinition, FieldId, FieldOption, FieldType, FieldValue,
    FormSchema, FormSchemaPatch, NewFormSchema, ValidationErrorMap, ValidationRules, ValueSet,
    MAX_FIELDS, MAX_FORM_NAME_LENGTH, MIN_FORM_NAME_LENGTH,
};
pub use validator::{
    field_rules, get_field_error, has_validation_errors, parse_float, validate_field,
    validate_form, validate_rule, ValidationRule, EMAIL_MESSAGE, PASSWORD_MESSAGE,
};
