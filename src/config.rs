//! Authoring-time checks on field definitions.
//!
//! These run before a definition is committed to a field list. The
//! evaluation engines assume every schema they see has passed them, so
//! derived parents are never re-checked during recompute.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::types::{
    DerivedKind, DerivedSpec, FieldDefinition, MAX_FIELDS, MAX_FORM_NAME_LENGTH,
    MIN_FORM_NAME_LENGTH,
};

/// Check a single field definition against the fields it will live with.
///
/// `all_fields` may include `field` itself (when editing an existing field);
/// it is skipped when resolving derived parents.
///
/// # Errors
///
/// Returns the first violated invariant: blank label, select/radio without
/// options, derived without a spec (or a spec on a plain field), or a bad
/// derived parent.
pub fn validate_config(
    field: &FieldDefinition,
    all_fields: &[FieldDefinition],
) -> Result<(), ConfigError> {
    match config_errors(field, all_fields).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Every invariant `field` violates, in check order.
pub fn config_errors(field: &FieldDefinition, all_fields: &[FieldDefinition]) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if field.label.trim().is_empty() {
        errors.push(ConfigError::BlankLabel {
            field: field.id.clone(),
        });
    }

    if field.field_type.has_options() && field.options.is_empty() {
        errors.push(ConfigError::MissingOptions {
            field: field.id.clone(),
        });
    }

    if field.is_derived {
        match &field.derived_spec {
            None => errors.push(ConfigError::MissingDerivedSpec {
                field: field.id.clone(),
            }),
            Some(spec) => {
                if let Err(err) = validate_derived_spec(spec, &field.id, all_fields) {
                    errors.push(err);
                }
            }
        }
    } else if field.derived_spec.is_some() {
        errors.push(ConfigError::UnexpectedDerivedSpec {
            field: field.id.clone(),
        });
    }

    errors
}

/// Check that every parent of `spec` exists, is editable and has the right type.
///
/// # Errors
///
/// Returns `ConfigError::SelfReference`, `UnknownParent`, `DerivedParent`
/// or `WrongParentType` for the first offending parent.
pub fn validate_derived_spec(
    spec: &DerivedSpec,
    field_id: &str,
    all_fields: &[FieldDefinition],
) -> Result<(), ConfigError> {
    let expected = spec.kind().parent_type();

    for parent in spec.parents() {
        if parent == field_id {
            return Err(ConfigError::SelfReference {
                field: field_id.to_string(),
            });
        }

        let Some(parent_field) = all_fields.iter().find(|f| f.id == parent) else {
            return Err(ConfigError::UnknownParent {
                field: field_id.to_string(),
                parent: parent.to_string(),
            });
        };

        if parent_field.is_derived {
            return Err(ConfigError::DerivedParent {
                field: field_id.to_string(),
                parent: parent.to_string(),
            });
        }

        if parent_field.field_type != expected {
            return Err(ConfigError::WrongParentType {
                field: field_id.to_string(),
                parent: parent.to_string(),
                expected,
            });
        }
    }

    Ok(())
}

/// Fields that may serve as a parent for a derivation of `kind`.
///
/// Excludes `current_field` (the derived field being edited) and any
/// derived field; keeps only fields of the kind's parent type, in order.
pub fn get_available_parent_fields<'a>(
    kind: DerivedKind,
    all_fields: &'a [FieldDefinition],
    current_field: Option<&str>,
) -> Vec<&'a FieldDefinition> {
    let parent_type = kind.parent_type();
    all_fields
        .iter()
        .filter(|f| Some(f.id.as_str()) != current_field)
        .filter(|f| !f.is_derived)
        .filter(|f| f.field_type == parent_type)
        .collect()
}

/// Check a form's display name.
///
/// # Errors
///
/// Returns `ConfigError::InvalidFormName` for a blank name or one longer
/// than `MAX_FORM_NAME_LENGTH` characters.
pub fn validate_form_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::InvalidFormName {
            message: "Form name is required".to_string(),
        });
    }

    let len = name.chars().count();
    if len < MIN_FORM_NAME_LENGTH {
        return Err(ConfigError::InvalidFormName {
            message: format!(
                "Form name must be at least {} character",
                MIN_FORM_NAME_LENGTH
            ),
        });
    }
    if len > MAX_FORM_NAME_LENGTH {
        return Err(ConfigError::InvalidFormName {
            message: format!(
                "Form name must be no more than {} characters",
                MAX_FORM_NAME_LENGTH
            ),
        });
    }

    Ok(())
}

/// Check a whole schema before it is saved.
///
/// # Errors
///
/// Returns the first problem found: bad name, too many fields, a duplicate
/// id, or a field failing [`validate_config`].
pub fn validate_schema(name: &str, fields: &[FieldDefinition]) -> Result<(), ConfigError> {
    validate_form_name(name)?;

    if fields.len() > MAX_FIELDS {
        return Err(ConfigError::TooManyFields { max: MAX_FIELDS });
    }

    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.id.as_str()) {
            return Err(ConfigError::DuplicateId {
                field: field.id.clone(),
            });
        }
    }

    for field in fields {
        validate_config(field, fields)?;
    }

    Ok(())
}
